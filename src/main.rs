mod command_line;

use anyhow::{Context, Result};
use dynamo_data_layer::config::AppConfig;
use dynamo_data_layer::dynamodb::{DynamoDb, SchemaRegistry};
use dynamo_data_layer::logging;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging()?;

    let config = AppConfig::from_env()?;
    let registry = SchemaRegistry::from_file(&config.schema_path)
        .with_context(|| format!("loading schemas from {}", config.schema_path.display()))?;
    info!(
        "Loaded {} table schemas from {}",
        registry.len(),
        config.schema_path.display()
    );

    let sdk_config = aws_config::load_from_env().await;
    let ddb = DynamoDb::from_sdk_config(&sdk_config, registry).with_retry_policy(config.retry_policy);

    command_line::run(&ddb).await
}
