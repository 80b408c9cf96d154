pub mod client;
pub mod retry;

pub use client::ApiClient;
pub use retry::RetryConfig;
