use serde::{Deserialize, Serialize};

/// Events emitted while a chat action runs.
/// UI subscribes to these for reactive updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChatEvent {
    /// A user message was appended and the model request is about to start
    TurnStart { turn_id: u64, chat_id: String },

    /// The model produced a text fragment
    LlmDelta { token: String },

    /// The model finished; `text` is the concatenation of every fragment
    LlmComplete { text: String },

    /// The turn is over, successfully or not
    TurnEnd { turn_id: u64 },

    /// A chat document was written or removed
    Persisted { chat_id: String },

    /// An action failed
    Error { message: String },
}
