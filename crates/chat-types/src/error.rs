use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ChatError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JS interop error: {0}")]
    JsInterop(String),

    #[error("No API key configured")]
    MissingApiKey,

    #[error("Chat '{0}' cannot be deleted")]
    ProtectedChat(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Invalid chat name: {0:?}")]
    InvalidChatName(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serialization(e.to_string())
    }
}
