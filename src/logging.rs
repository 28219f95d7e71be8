use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Environment variable holding the maximum log level (`trace` to `error`).
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";

pub fn init_logging() -> Result<()> {
    let level = match std::env::var(LOG_LEVEL_VAR) {
        Ok(value) => parse_level(&value)?,
        Err(_) => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn parse_level(value: &str) -> Result<Level> {
    value
        .trim()
        .parse::<Level>()
        .with_context(|| format!("invalid {LOG_LEVEL_VAR} '{value}'"))
}
