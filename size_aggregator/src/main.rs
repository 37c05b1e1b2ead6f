use anyhow::{bail, Result};
use aws_lambda_events::s3::S3Event;
use chrono::{DateTime, Utc};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use shared::config::AggregatorConfig;
use shared::records::{format_timestamp, DynamoRecordStore, RecordStore, SizeRecord};
use shared::storage::{ObjectStorage, S3Storage};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    shared::log::init();

    lambda_runtime::run(service_fn(func)).await?;
    Ok(())
}

async fn func(event: LambdaEvent<S3Event>) -> Result<()> {
    let config = AggregatorConfig::from_env()?;
    let bucket = bucket_from_event(&event.payload)?;

    let aws_config = aws_config::load_from_env().await;
    let storage = S3Storage::new(aws_sdk_s3::Client::new(&aws_config));
    let records = DynamoRecordStore::new(aws_sdk_dynamodb::Client::new(&aws_config), config.table_name);

    aggregate(&storage, &records, &bucket, Utc::now()).await?;

    Ok(())
}

/// The bucket the notification is about. A notification carries one record
/// per object mutation; an invocation must not mix buckets.
fn bucket_from_event(event: &S3Event) -> Result<String> {
    let mut names = event
        .records
        .iter()
        .filter_map(|record| record.s3.bucket.name.clone())
        .collect::<Vec<String>>();
    names.sort();
    names.dedup();

    match names.as_slice() {
        [name] => Ok(name.clone()),
        [] => bail!("event names no bucket"),
        _ => bail!("event names {} distinct buckets, expected exactly 1", names.len()),
    }
}

/// Recomputes the bucket's aggregate state from a full listing and appends
/// one snapshot stamped `at`. The listing and the write are not coordinated;
/// a mutation landing in between yields a slightly stale snapshot, which the
/// append-only store tolerates.
async fn aggregate(
    storage: &impl ObjectStorage,
    records: &impl RecordStore,
    bucket: &str,
    at: DateTime<Utc>,
) -> Result<SizeRecord> {
    let sizes = storage.list_object_sizes(bucket).await?;

    let record = SizeRecord {
        bucket_name: bucket.to_string(),
        timestamp: at,
        total_size: sizes.iter().sum(),
        object_count: sizes.len() as u64,
    };

    records.append(&record).await?;

    info!(
        "Bucket: {} | Size: {} bytes | Objects: {} | Time: {}",
        record.bucket_name,
        record.total_size,
        record.object_count,
        format_timestamp(record.timestamp)
    );

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use shared::memory::{InMemoryRecordStore, InMemoryStorage};

    fn instant(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn notification(buckets: &[&str]) -> S3Event {
        let records = buckets
            .iter()
            .map(|bucket| {
                serde_json::json!({
                    "eventVersion": "2.1",
                    "eventSource": "aws:s3",
                    "awsRegion": "us-west-2",
                    "eventTime": "2026-08-05T12:00:00.000Z",
                    "eventName": "ObjectCreated:Put",
                    "userIdentity": { "principalId": "AWS:EXAMPLE" },
                    "requestParameters": { "sourceIPAddress": "127.0.0.1" },
                    "responseElements": {
                        "x-amz-request-id": "C3D13FE58DE4C810",
                        "x-amz-id-2": "FMyUVURIY8/IgAtTv8xRjskZQpcIZ9KG4V5Wp6S7S/JRWeUWerMUE5JgHvANOjpD"
                    },
                    "s3": {
                        "s3SchemaVersion": "1.0",
                        "configurationId": "size-tracking",
                        "bucket": {
                            "name": bucket,
                            "ownerIdentity": { "principalId": "EXAMPLE" },
                            "arn": format!("arn:aws:s3:::{bucket}")
                        },
                        "object": {
                            "key": "a.txt",
                            "size": 19,
                            "eTag": "0123456789abcdef0123456789abcdef",
                            "sequencer": "0A1B2C3D4E5F678901"
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        serde_json::from_value(serde_json::json!({ "Records": records })).unwrap()
    }

    #[test]
    fn event_with_one_bucket_resolves() {
        let event = notification(&["test-bucket"]);
        assert_eq!(bucket_from_event(&event).unwrap(), "test-bucket");
    }

    #[test]
    fn event_with_repeated_bucket_resolves() {
        let event = notification(&["test-bucket", "test-bucket"]);
        assert_eq!(bucket_from_event(&event).unwrap(), "test-bucket");
    }

    #[test]
    fn event_with_no_records_is_rejected() {
        let event = notification(&[]);
        assert!(bucket_from_event(&event).is_err());
    }

    #[test]
    fn event_mixing_buckets_is_rejected() {
        let event = notification(&["bucket-a", "bucket-b"]);
        assert!(bucket_from_event(&event).is_err());
    }

    #[tokio::test]
    async fn snapshot_tracks_put_update_delete() {
        let storage = InMemoryStorage::new();
        let records = InMemoryRecordStore::new();

        storage.insert("b", "a.txt", &[b'x'; 19]);
        let snap = aggregate(&storage, &records, "b", instant(0)).await.unwrap();
        assert_eq!((snap.object_count, snap.total_size), (1, 19));

        storage.insert("b", "a.txt", &[b'x'; 28]);
        let snap = aggregate(&storage, &records, "b", instant(3)).await.unwrap();
        assert_eq!((snap.object_count, snap.total_size), (1, 28));

        storage.remove("b", "a.txt");
        let snap = aggregate(&storage, &records, "b", instant(6)).await.unwrap();
        assert_eq!((snap.object_count, snap.total_size), (0, 0));

        storage.insert("b", "b.txt", &[b'x'; 2]);
        let snap = aggregate(&storage, &records, "b", instant(9)).await.unwrap();
        assert_eq!((snap.object_count, snap.total_size), (1, 2));

        // One append per invocation, and the all-time peak spans deletions.
        assert_eq!(records.len(), 4);
        assert_eq!(records.peak_total_size("b").await.unwrap(), 28);
    }

    #[tokio::test]
    async fn snapshot_sums_across_many_objects() {
        let storage = InMemoryStorage::new();
        let records = InMemoryRecordStore::new();

        for i in 0..250 {
            storage.insert("b", &format!("obj-{i:03}"), &[b'x'; 4]);
        }

        let snap = aggregate(&storage, &records, "b", instant(0)).await.unwrap();
        assert_eq!((snap.object_count, snap.total_size), (250, 1000));
    }

    #[tokio::test]
    async fn reinvocation_without_mutation_appends_a_duplicate_snapshot() {
        let storage = InMemoryStorage::new();
        let records = InMemoryRecordStore::new();
        storage.insert("b", "a.txt", &[b'x'; 19]);

        aggregate(&storage, &records, "b", instant(0)).await.unwrap();
        aggregate(&storage, &records, "b", instant(1)).await.unwrap();

        let rows = records.records();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].total_size, rows[1].total_size);
        assert_eq!(rows[0].object_count, rows[1].object_count);
        assert!(rows[0].timestamp < rows[1].timestamp);
    }

    #[tokio::test]
    async fn snapshot_only_counts_the_named_bucket() {
        let storage = InMemoryStorage::new();
        let records = InMemoryRecordStore::new();
        storage.insert("b", "a.txt", &[b'x'; 19]);
        storage.insert("other", "big.bin", &[b'x'; 4096]);

        let snap = aggregate(&storage, &records, "b", instant(0)).await.unwrap();
        assert_eq!((snap.object_count, snap.total_size), (1, 19));
    }
}
