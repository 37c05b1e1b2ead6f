use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use shared::config::RendererConfig;
use shared::records::{DynamoRecordStore, RecordStore};
use shared::storage::{ObjectStorage, S3Storage};
use tracing::info;

mod chart;

const PLOT_CONTENT_TYPE: &str = "image/svg+xml";

#[derive(Debug, Serialize)]
struct Response {
    message: String,
    key: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    shared::log::init();

    lambda_runtime::run(service_fn(func)).await?;
    Ok(())
}

async fn func(_event: LambdaEvent<Value>) -> Result<Response> {
    let config = RendererConfig::from_env()?;

    let aws_config = aws_config::load_from_env().await;
    let storage = S3Storage::new(aws_sdk_s3::Client::new(&aws_config));
    let records = DynamoRecordStore::new(
        aws_sdk_dynamodb::Client::new(&aws_config),
        config.table_name.clone(),
    );

    render(&storage, &records, &config, Utc::now()).await
}

/// Queries the trailing window plus the all-time peak for the configured
/// bucket, renders the chart, and overwrites the artifact object. The two
/// queries are independent reads; a record landing between them may show up
/// in one and not the other.
async fn render(
    storage: &impl ObjectStorage,
    records: &impl RecordStore,
    config: &RendererConfig,
    now: DateTime<Utc>,
) -> Result<Response> {
    let since = now - Duration::seconds(config.window_secs as i64);

    let mut recent = records.query_since(&config.bucket_name, since).await?;
    let peak = records.peak_total_size(&config.bucket_name).await?;

    recent.sort_by_key(|record| record.timestamp);

    info!(
        "Bucket: {} | Records in window: {} | Peak: {} bytes",
        config.bucket_name,
        recent.len(),
        peak
    );

    let svg = if recent.is_empty() {
        chart::placeholder(config.window_secs)?
    } else {
        chart::size_history(&recent, peak, config.window_secs)?
    };

    storage
        .put_object(
            &config.bucket_name,
            &config.plot_key,
            svg.into_bytes(),
            PLOT_CONTENT_TYPE,
        )
        .await?;

    Ok(Response {
        message: format!("Plot saved to {}", config.bucket_name),
        key: config.plot_key.clone(),
    })
}
