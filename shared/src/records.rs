//! Size-history records and the stores that hold them.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// One snapshot of a bucket's aggregate contents.
///
/// Every snapshot is a full recomputation over the bucket, never a delta, so
/// a lost or duplicated record cannot corrupt later ones. `(bucket_name,
/// timestamp)` is the primary key; rows are written once and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeRecord {
    pub bucket_name: String,
    pub timestamp: DateTime<Utc>,
    pub total_size: u64,
    pub object_count: u64,
}

/// Formats a timestamp as RFC 3339 with fixed-width microseconds and a `Z`
/// suffix. Fixed width keeps the stored strings in lexical order equal to
/// chronological order, which the table's sort key relies on.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let parsed =
        DateTime::parse_from_rfc3339(raw).with_context(|| format!("invalid timestamp: {raw:?}"))?;
    Ok(parsed.with_timezone(&Utc))
}

/// Append-only store of [`SizeRecord`]s, queryable per bucket.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Appends one record. Never overwrites, never retries.
    async fn append(&self, record: &SizeRecord) -> Result<()>;

    /// All records for `bucket` with `timestamp >= since`.
    async fn query_since(&self, bucket: &str, since: DateTime<Utc>) -> Result<Vec<SizeRecord>>;

    /// Largest `total_size` ever recorded for `bucket`, 0 if none exists.
    async fn peak_total_size(&self, bucket: &str) -> Result<u64>;
}

/// [`RecordStore`] backed by a DynamoDB table with partition key
/// `bucket_name` (S) and sort key `timestamp` (S).
pub struct DynamoRecordStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoRecordStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn query_pages(
        &self,
        bucket: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SizeRecord>> {
        let mut records = Vec::new();
        let mut start_key = None;

        loop {
            // `timestamp` is a DynamoDB reserved word, so the sort key only
            // appears through an expression attribute name.
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .expression_attribute_names("#bucket", "bucket_name")
                .expression_attribute_values(":bucket", AttributeValue::S(bucket.to_string()));

            request = match since {
                Some(since) => request
                    .key_condition_expression("#bucket = :bucket AND #ts >= :since")
                    .expression_attribute_names("#ts", "timestamp")
                    .expression_attribute_values(
                        ":since",
                        AttributeValue::S(format_timestamp(since)),
                    ),
                None => request.key_condition_expression("#bucket = :bucket"),
            };

            if let Some(key) = start_key.take() {
                request = request.set_exclusive_start_key(Some(key));
            }

            let response = request.send().await?;

            if let Some(items) = response.items {
                for item in &items {
                    records.push(record_from_item(item)?);
                }
            }

            match response.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    async fn append(&self, record: &SizeRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(record_to_item(record)))
            .send()
            .await?;

        Ok(())
    }

    async fn query_since(&self, bucket: &str, since: DateTime<Utc>) -> Result<Vec<SizeRecord>> {
        self.query_pages(bucket, Some(since)).await
    }

    async fn peak_total_size(&self, bucket: &str) -> Result<u64> {
        let records = self.query_pages(bucket, None).await?;
        Ok(records.iter().map(|r| r.total_size).max().unwrap_or(0))
    }
}

fn record_to_item(record: &SizeRecord) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            "bucket_name".to_string(),
            AttributeValue::S(record.bucket_name.clone()),
        ),
        (
            "timestamp".to_string(),
            AttributeValue::S(format_timestamp(record.timestamp)),
        ),
        (
            "total_size".to_string(),
            AttributeValue::N(record.total_size.to_string()),
        ),
        (
            "object_count".to_string(),
            AttributeValue::N(record.object_count.to_string()),
        ),
    ])
}

fn record_from_item(item: &HashMap<String, AttributeValue>) -> Result<SizeRecord> {
    Ok(SizeRecord {
        bucket_name: string_attr(item, "bucket_name")?,
        timestamp: parse_timestamp(&string_attr(item, "timestamp")?)?,
        total_size: number_attr(item, "total_size")?,
        object_count: number_attr(item, "object_count")?,
    })
}

fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Result<String> {
    let value = item
        .get(name)
        .with_context(|| format!("item missing attribute {name:?}"))?;
    let raw = value
        .as_s()
        .map_err(|_| anyhow!("attribute {name:?} is not a string"))?;
    Ok(raw.clone())
}

fn number_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Result<u64> {
    let value = item
        .get(name)
        .with_context(|| format!("item missing attribute {name:?}"))?;
    let raw = value
        .as_n()
        .map_err(|_| anyhow!("attribute {name:?} is not a number"))?;
    raw.parse::<u64>()
        .with_context(|| format!("attribute {name:?} is not a non-negative integer: {raw:?}"))
}
