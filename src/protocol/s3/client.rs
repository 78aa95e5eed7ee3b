//! S3 client implementation

use super::config::{S3ClientConfig, APP_NAME};
use super::error::classify;
use crate::protocol::{
    ListPage, ListedObject, ObjectBody, ObjectHead, ObjectStore, StorageError, StorageResult,
};
use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{AppName, BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as AwsS3Client;
use bytes::Bytes;
use futures::StreamExt;
use secrecy::ExposeSecret;
use std::time::{Duration, SystemTime};

/// Object store backed by an S3-compatible service
#[derive(Clone, Debug)]
pub struct S3Store {
    client: AwsS3Client,
    bucket: String,
}

impl S3Store {
    /// Build the SDK client from resolved settings
    ///
    /// No request is sent here; credentials are only checked by the first
    /// operation against the bucket.
    pub fn new(config: &S3ClientConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            config.access_key.expose_secret(),
            config.secret_key.expose_secret(),
            None,
            None,
            "comfy-cloud-profile",
        );

        let app_name = AppName::new(APP_NAME).map_err(|e| StorageError::Service {
            code: "InvalidAppName".to_string(),
            message: e.to_string(),
        })?;

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.addressing.force_path_style())
            .retry_config(RetryConfig::disabled())
            .app_name(app_name);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: AwsS3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }

    /// Get a reference to the underlying AWS S3 client
    pub fn aws_client(&self) -> &AwsS3Client {
        &self.client
    }
}

fn to_system_time(dt: Option<&aws_sdk_s3::primitives::DateTime>) -> Option<SystemTime> {
    dt.and_then(|dt| SystemTime::try_from(*dt).ok())
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectHead> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, &self.bucket, key))?;

        Ok(ObjectHead {
            key: key.to_string(),
            size: response.content_length().map(|len| len.max(0) as u64),
            etag: response.e_tag().map(str::to_string),
            last_modified: to_system_time(response.last_modified()),
        })
    }

    async fn get(&self, key: &str) -> StorageResult<ObjectBody> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, &self.bucket, key))?;

        let head = ObjectHead {
            key: key.to_string(),
            size: response.content_length().map(|len| len.max(0) as u64),
            etag: response.e_tag().map(str::to_string),
            last_modified: to_system_time(response.last_modified()),
        };

        let stream = futures::stream::try_unfold(response.body, |mut body: ByteStream| async move {
            match body.try_next().await {
                Ok(Some(chunk)) => Ok(Some((chunk, body))),
                Ok(None) => Ok(None),
                Err(e) => Err(StorageError::Network(format!(
                    "Failed to read response body: {}",
                    e
                ))),
            }
        })
        .boxed();

        Ok(ObjectBody { head, stream })
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| classify(e, &self.bucket, key))?;
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> StorageResult<ListPage> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| classify(e, &self.bucket, prefix))?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|obj| {
                Some(ListedObject {
                    key: obj.key()?.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: to_system_time(obj.last_modified()),
                })
            })
            .collect();

        Ok(ListPage {
            objects,
            continuation_token: response.next_continuation_token().map(str::to_string),
            is_truncated: response.is_truncated().unwrap_or(false),
        })
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Signing(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| classify(e, &self.bucket, key))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::s3::AddressingStyle;
    use secrecy::SecretString;

    fn config(endpoint: Option<&str>) -> S3ClientConfig {
        S3ClientConfig {
            bucket: "test-bucket".to_string(),
            region: "us-west-004".to_string(),
            endpoint: endpoint.map(str::to_string),
            access_key: SecretString::from("AKID"),
            secret_key: SecretString::from("SECRET"),
            addressing: AddressingStyle::VirtualHost,
        }
    }

    #[test]
    fn test_client_creation_is_offline() {
        let store = S3Store::new(&config(Some("https://s3.us-west-004.backblazeb2.com"))).unwrap();
        assert_eq!(store.bucket(), "test-bucket");
    }

    #[test]
    fn test_client_region_and_app_name() {
        let store = S3Store::new(&config(Some("https://s3.us-west-004.backblazeb2.com"))).unwrap();
        let conf = store.aws_client().config();
        assert_eq!(
            conf.region().map(|r| r.to_string()),
            Some("us-west-004".to_string())
        );
        assert_eq!(
            conf.app_name().map(|a| a.to_string()),
            Some(APP_NAME.to_string())
        );
    }

    #[tokio::test]
    async fn test_presign_is_local() {
        let store = S3Store::new(&config(Some("https://s3.us-west-004.backblazeb2.com"))).unwrap();
        let url = store
            .presign_get("outputs/image.png", Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(url.contains("outputs/image.png"));
        assert!(url.contains("X-Amz-Expires=3600"));
    }

    #[tokio::test]
    async fn test_presign_rejects_expiry_over_a_week() {
        let store = S3Store::new(&config(None)).unwrap();
        let err = store
            .presign_get("k", Duration::from_secs(8 * 24 * 3600))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Signing(_)));
    }
}
