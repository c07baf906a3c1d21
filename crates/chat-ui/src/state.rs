//! UI-level state that drives rendering.
//! The transcript itself lives in the session; this holds what only the
//! screen needs (streaming buffer, input fields, status line), updated
//! each frame by draining the EventBus.

use chat_types::event::ChatEvent;

/// State visible to UI panels
pub struct UiState {
    /// Reply text assembled from stream fragments
    pub streaming_text: String,
    /// Chat input field content
    pub input_text: String,
    /// "New chat" name field content
    pub new_chat_name: String,
    /// API key field content
    pub api_key_input: String,
    /// Status line text
    pub status_text: String,
    /// Last failure, shown below the transcript until the next turn
    pub notice: Option<String>,
    /// Chat id of the last successful write
    last_saved: Option<String>,
    busy: bool,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            streaming_text: String::new(),
            input_text: String::new(),
            new_chat_name: String::new(),
            api_key_input: String::new(),
            status_text: "Ready".to_string(),
            notice: None,
            last_saved: None,
            busy: false,
        }
    }

    /// Process events from the EventBus and update UI state
    pub fn process_events(&mut self, events: Vec<ChatEvent>) {
        for event in events {
            match event {
                ChatEvent::TurnStart { .. } => {
                    self.busy = true;
                    self.streaming_text.clear();
                    self.notice = None;
                    self.last_saved = None;
                    self.status_text = "Thinking...".to_string();
                }
                ChatEvent::LlmDelta { token } => {
                    if self.streaming_text.is_empty() {
                        self.status_text = "Streaming...".to_string();
                    }
                    self.streaming_text.push_str(&token);
                }
                ChatEvent::LlmComplete { .. } => {
                    // The final text is now part of the session transcript
                    self.streaming_text.clear();
                }
                ChatEvent::TurnEnd { .. } => {
                    self.busy = false;
                    self.streaming_text.clear();
                    if self.notice.is_none() {
                        self.status_text = "Ready".to_string();
                    }
                }
                ChatEvent::Persisted { chat_id } => {
                    log::debug!("UI: '{}' persisted", chat_id);
                    self.last_saved = Some(chat_id);
                }
                ChatEvent::Error { message } => {
                    self.status_text = message.clone();
                    self.notice = Some(message);
                }
            }
        }
    }

    /// Take the input field content if it can be sent
    pub fn take_input(&mut self) -> Option<String> {
        let text = self.input_text.trim().to_string();
        if text.is_empty() || self.busy {
            return None;
        }
        self.input_text.clear();
        Some(text)
    }

    /// Take the new-chat name field content if it is non-blank
    pub fn take_new_chat_name(&mut self) -> Option<String> {
        let name = self.new_chat_name.trim().to_string();
        if name.is_empty() || self.busy {
            return None;
        }
        self.new_chat_name.clear();
        Some(name)
    }

    /// Forget transient per-chat display state (after switching chats)
    pub fn reset_transcript_view(&mut self) {
        self.streaming_text.clear();
        self.notice = None;
        if !self.busy {
            self.status_text = "Ready".to_string();
        }
    }

    /// Whether the latest write recorded `chat_id`
    pub fn is_saved(&self, chat_id: &str) -> bool {
        self.last_saved.as_deref() == Some(chat_id)
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}
