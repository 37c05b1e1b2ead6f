//! Object storage access: full-bucket enumeration and artifact writes.

use anyhow::Result;
use async_trait::async_trait;
use aws_smithy_http::byte_stream::ByteStream;

/// The two storage operations the pipeline needs.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Byte sizes of every object currently in `bucket`, from a full
    /// paginated enumeration. Listing consistency is whatever the backing
    /// store provides.
    async fn list_object_sizes(&self, bucket: &str) -> Result<Vec<u64>>;

    /// Writes `bytes` under `key` with an explicit content type, overwriting
    /// any previous object wholesale.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

/// [`ObjectStorage`] backed by S3.
pub struct S3Storage {
    client: aws_sdk_s3::Client,
}

impl S3Storage {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn list_object_sizes(&self, bucket: &str) -> Result<Vec<u64>> {
        let mut sizes = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await?;

            if let Some(contents) = response.contents {
                sizes.extend(contents.iter().map(|object| object.size().max(0) as u64));
            }

            if response.is_truncated {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(sizes)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await?;

        Ok(())
    }
}
