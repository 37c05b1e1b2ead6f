//! In-memory implementations of the storage traits. Used by tests across the
//! workspace to drive the pipeline without AWS.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::records::{RecordStore, SizeRecord};
use crate::storage::ObjectStorage;

#[derive(Default)]
pub struct InMemoryRecordStore {
    rows: Mutex<Vec<SizeRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SizeRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn append(&self, record: &SizeRecord) -> Result<()> {
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn query_since(&self, bucket: &str, since: DateTime<Utc>) -> Result<Vec<SizeRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.bucket_name == bucket && r.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn peak_total_size(&self, bucket: &str) -> Result<u64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.bucket_name == bucket)
            .map(|r| r.total_size)
            .max()
            .unwrap_or(0))
    }
}

/// A stored object: payload plus the content type it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct InMemoryStorage {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, StoredObject>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces an object without going through the trait.
    pub fn insert(&self, bucket: &str, key: &str, bytes: &[u8]) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredObject {
                    bytes: bytes.to_vec(),
                    content_type: "application/octet-stream".to_string(),
                },
            );
    }

    /// Deletes an object if present.
    pub fn remove(&self, bucket: &str, key: &str) {
        if let Some(objects) = self.buckets.lock().unwrap().get_mut(bucket) {
            objects.remove(key);
        }
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn list_object_sizes(&self, bucket: &str) -> Result<Vec<u64>> {
        Ok(self
            .buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| objects.values().map(|o| o.bytes.len() as u64).collect())
            .unwrap_or_default())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredObject {
                    bytes,
                    content_type: content_type.to_string(),
                },
            );
        Ok(())
    }
}
