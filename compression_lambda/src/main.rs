use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::{run, service_fn, tracing, Error};
mod config;
mod error;
mod event_handler;
mod transcode;
use config::Config;
use event_handler::function_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // honours AWS_LAMBDA_LOG_LEVEL / AWS_LAMBDA_LOG_FORMAT, falling back to RUST_LOG
    tracing::init_default_subscriber();
    let config = Config::from_env()?;
    tracing::info!(
        quality = config.quality,
        conditional_writes = config.conditional_writes,
        "starting"
    );
    let shared_config = aws_config::load_defaults(BehaviorVersion::v2025_01_17()).await;
    let s3_client = S3Client::new(&shared_config);
    run(service_fn(|event| function_handler(event, &s3_client, &config))).await
}
