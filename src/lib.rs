pub mod config;
pub mod dynamodb;
pub mod logging;
pub mod utils;

pub use utils::{retry_with_backoff, RetryPolicy};
