//! Shared AWS SDK configuration loading

use crate::core::AwsConfig;

/// Load the SDK config from the default provider chain, honouring an explicit
/// region override.
pub async fn load_sdk_config(aws: &AwsConfig) -> aws_config::SdkConfig {
    let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(ref region) = aws.region {
        config_loader = config_loader.region(aws_config::Region::new(region.clone()));
    }

    config_loader.load().await
}
