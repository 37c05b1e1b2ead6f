//! Renders the size-history artifact as an SVG document.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;
use shared::records::SizeRecord;

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 500;

/// Line chart of `total_size` over the recent window, with a horizontal
/// reference line at the all-time peak. `records` must already be sorted by
/// ascending timestamp and must not be empty.
pub fn size_history(records: &[SizeRecord], peak: u64, window_secs: u64) -> Result<String> {
    let (first, last) = match (records.first(), records.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => bail!("no records to plot"),
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        // Pad the time axis so a lone record still spans a drawable range.
        let x_start = first - Duration::seconds(1);
        let x_end = last + Duration::seconds(1);
        let y_top = peak.max(1) as f64 * 1.1;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("Bucket size (last {window_secs} seconds)"),
                ("sans-serif", 24),
            )
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(x_start..x_end, 0f64..y_top)?;

        chart
            .configure_mesh()
            .x_desc("Timestamp (UTC)")
            .y_desc("Total size (bytes)")
            .x_label_formatter(&|ts: &DateTime<Utc>| ts.format("%H:%M:%S").to_string())
            .y_label_formatter(&|size: &f64| format!("{size:.0}"))
            .draw()?;

        chart
            .draw_series(LineSeries::new(
                records.iter().map(|r| (r.timestamp, r.total_size as f64)),
                BLUE.stroke_width(2),
            ))?
            .label("bucket size")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], &BLUE));

        chart.draw_series(
            records
                .iter()
                .map(|r| Circle::new((r.timestamp, r.total_size as f64), 3, BLUE.filled())),
        )?;

        chart
            .draw_series(LineSeries::new(
                [(x_start, peak as f64), (x_end, peak as f64)],
                RED.stroke_width(1),
            ))?
            .label(format!("Peak: {peak} bytes"))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], &RED));

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
    }

    Ok(svg)
}

/// Placeholder artifact for a window with no records. Rendering an empty
/// window is a valid outcome, not an error.
pub fn placeholder(window_secs: u64) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        root.draw(&Text::new(
            format!("Bucket size (last {window_secs} seconds)"),
            (20, 20),
            ("sans-serif", 24),
        ))?;
        root.draw(&Text::new(
            format!("No data in the last {window_secs} seconds"),
            (WIDTH as i32 / 2 - 140, HEIGHT as i32 / 2),
            ("sans-serif", 20),
        ))?;

        root.present()?;
    }

    Ok(svg)
}
