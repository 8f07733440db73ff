//! Shared AWS SDK configuration and service clients.

use crate::config::types::AwsConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::debug;

/// Loads the SDK configuration: region from config, credentials from the default chain (or the
/// named profile), and an optional endpoint override applied to every service.
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint {
        debug!(endpoint = %endpoint, "Using custom AWS endpoint");
        loader = loader.endpoint_url(endpoint);
    }

    if let Some(profile) = &config.profile {
        debug!(profile = %profile, "Using AWS profile");
        loader = loader.profile_name(profile);
    }

    loader.load().await
}

pub fn dynamodb_client(sdk_config: &SdkConfig) -> aws_sdk_dynamodb::Client {
    aws_sdk_dynamodb::Client::new(sdk_config)
}

/// S3 client. Custom endpoints (LocalStack, MinIO) get path-style addressing.
pub fn s3_client(sdk_config: &SdkConfig, custom_endpoint: bool) -> aws_sdk_s3::Client {
    let builder = aws_sdk_s3::config::Builder::from(sdk_config);
    let s3_config = if custom_endpoint {
        builder.force_path_style(true).build()
    } else {
        builder.build()
    };
    aws_sdk_s3::Client::from_conf(s3_config)
}
