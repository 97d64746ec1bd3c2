//! S3 upload through the AWS SDK.

use std::path::Path;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::runtime::Runtime;

use super::{ArtifactDistributor, DistributionError, RemoteDestination};

/// Uploads artifacts with `put_object`, using credentials and region from
/// the standard AWS environment.
pub struct S3Distributor {
    runtime: Runtime,
    client: Client,
}

impl S3Distributor {
    pub fn from_env() -> Result<Self, DistributionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DistributionError::Unavailable(e.to_string()))?;
        let config = runtime.block_on(aws_config::load_from_env());
        let client = Client::new(&config);
        Ok(Self { runtime, client })
    }
}

impl ArtifactDistributor for S3Distributor {
    fn distribute(
        &self,
        local: &Path,
        destination: &RemoteDestination,
    ) -> Result<(), DistributionError> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(local)
                .await
                .map_err(|e| DistributionError::Read {
                    path: local.to_path_buf(),
                    source: std::io::Error::other(e),
                })?;

            self.client
                .put_object()
                .bucket(&destination.bucket)
                .key(&destination.key)
                .body(body)
                .send()
                .await
                .map_err(|e| DistributionError::Upload {
                    destination: destination.clone(),
                    message: aws_sdk_s3::error::DisplayErrorContext(e).to_string(),
                })?;
            Ok(())
        })
    }
}
