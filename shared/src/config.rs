use anyhow::{Context, Result};

const DEFAULT_PLOT_KEY: &str = "plot";
const DEFAULT_WINDOW_SECS: u64 = 10;

/// Runtime configuration for the size aggregator function.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// DynamoDB table holding the size history. Env: `TABLE_NAME`, required.
    pub table_name: String,
}

impl AggregatorConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            table_name: require("TABLE_NAME")?,
        })
    }
}

/// Runtime configuration for the plot renderer function.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// DynamoDB table holding the size history. Env: `TABLE_NAME`, required.
    pub table_name: String,
    /// Bucket whose history is plotted and which receives the artifact.
    /// Env: `BUCKET_NAME`, required.
    pub bucket_name: String,
    /// Object key the rendered chart is written under.
    /// Env: `PLOT_KEY`, default `plot`.
    pub plot_key: String,
    /// Trailing window, in seconds, of records considered recent.
    /// Env: `WINDOW_SECONDS`, default 10, must be a positive integer.
    pub window_secs: u64,
}

impl RendererConfig {
    pub fn from_env() -> Result<Self> {
        let window_secs = match std::env::var("WINDOW_SECONDS") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("WINDOW_SECONDS is not a whole number of seconds: {raw:?}"))?,
            Err(_) => DEFAULT_WINDOW_SECS,
        };
        anyhow::ensure!(window_secs > 0, "WINDOW_SECONDS must be > 0");

        Ok(Self {
            table_name: require("TABLE_NAME")?,
            bucket_name: require("BUCKET_NAME")?,
            plot_key: std::env::var("PLOT_KEY").unwrap_or_else(|_| DEFAULT_PLOT_KEY.to_string()),
            window_secs,
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} not set"))
}
