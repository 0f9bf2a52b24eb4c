use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, RequestChecksumCalculation},
    error::DisplayErrorContext,
};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use tracing::debug;

use super::error::UploadError;
use crate::config::Config;

/// B2 client speaking the S3-compatible API
pub struct B2Client {
    client: Client,
}

impl B2Client {
    pub async fn new(config: &Config) -> Self {
        // appID identifies the account, keyID is the secret half
        let credentials = Credentials::new(
            config.app_id.clone(),
            config.key_id.clone(),
            None,
            None,
            "b2up",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .load()
            .await;

        // B2 rejects the flexible checksums newer SDKs send by default
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();

        debug!("Using endpoint {} ({})", config.endpoint, config.region);

        Self::from_client(Client::from_conf(s3_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Check that a bucket exists and is reachable with these credentials
    pub async fn check_bucket(&self, name: &str) -> std::result::Result<(), UploadError> {
        self.client
            .head_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(|e| UploadError::from_bucket_error(name, DisplayErrorContext(e)))?;
        Ok(())
    }
}

/// Object store for the configured bucket, used for the uploads themselves
pub fn bucket_store(config: &Config) -> Result<AmazonS3> {
    AmazonS3Builder::new()
        .with_endpoint(&config.endpoint)
        .with_allow_http(config.endpoint.starts_with("http://"))
        .with_region(&config.region)
        .with_bucket_name(&config.bucket)
        .with_access_key_id(&config.app_id)
        .with_secret_access_key(&config.key_id)
        .build()
        .with_context(|| format!("could not configure the bucket {:?}", config.bucket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::head_bucket::{HeadBucketError, HeadBucketOutput};
    use aws_sdk_s3::types::error::NotFound;
    use aws_smithy_mocks::{mock, mock_client};
    use std::path::PathBuf;

    fn config(endpoint: &str) -> Config {
        Config {
            key_id: "secret".to_string(),
            app_id: "0041234567890ab0000000001".to_string(),
            bucket: "backups".to_string(),
            src: PathBuf::from("/tmp/onefile.txt"),
            dst: "backup".to_string(),
            writers: 10,
            region: "us-west-004".to_string(),
            endpoint: endpoint.to_string(),
            part_size: 10 * 1024 * 1024,
        }
    }

    #[tokio::test]
    async fn test_check_existing_bucket() {
        let head = mock!(aws_sdk_s3::Client::head_bucket)
            .match_requests(|req| req.bucket() == Some("backups"))
            .then_output(|| HeadBucketOutput::builder().build());
        let client = B2Client::from_client(mock_client!(aws_sdk_s3, [&head]));

        client.check_bucket("backups").await.unwrap();
        assert_eq!(head.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_check_missing_bucket() {
        let head = mock!(aws_sdk_s3::Client::head_bucket)
            .then_error(|| HeadBucketError::NotFound(NotFound::builder().build()));
        let client = B2Client::from_client(mock_client!(aws_sdk_s3, [&head]));

        let err = client.check_bucket("nope").await.unwrap_err();
        assert!(matches!(err, UploadError::Bucket { ref bucket, .. } if bucket == "nope"));
        assert!(err.to_string().starts_with("could not get the bucket \"nope\""));
    }

    #[test]
    fn test_bucket_store_builds_offline() {
        assert!(bucket_store(&config("https://s3.us-west-004.backblazeb2.com")).is_ok());
        assert!(bucket_store(&config("http://localhost:9000")).is_ok());
    }
}
