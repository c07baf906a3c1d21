pub mod sse;
pub mod anthropic;

pub use anthropic::AnthropicProvider;
