mod client;
pub mod types;

pub use client::{Config, ConfigBuilder, GeminiClient, GeminiReceiver, GeminiSender, connect};
