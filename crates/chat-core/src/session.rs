//! Chat session: the explicit application state of one running UI.
//!
//! Holds the session config, the chat store, the API key and the turn state.
//! Every mutating action returns the `PersistOp` it needs so the caller can
//! write it out, and a message send is split into three steps so no borrow of
//! the session has to live across the streaming await:
//! 1. `begin_turn` appends the user message and builds the request
//! 2. `PendingTurn::stream` consumes the fragment stream
//! 3. `finish_turn` appends the assistant message (or `fail_turn` on error)

use futures::StreamExt;
use chat_types::{
    ChatError, Result,
    chat::DEFAULT_CHAT_ID,
    config::SessionConfig,
    event::ChatEvent,
    message::Message,
};
use crate::chat_store::ChatStore;
use crate::event_bus::EventBus;
use crate::persistence::{ChatRepository, PersistOp};
use crate::ports::{ChatRequest, LlmPort, LlmStreamEvent};

/// Whether chat interaction is possible at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No API key yet: only a warning is shown
    NoApiKey,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Streaming { turn_id: u64 },
    Error(String),
}

/// Text shown to the user for any failed action
pub fn error_message(err: &ChatError) -> String {
    format!("An error occurred: {}", err)
}

pub struct ChatSession {
    pub config: SessionConfig,
    chats: ChatStore,
    api_key: String,
    user_id: String,
    event_bus: EventBus,
    pub state: TurnState,
    turn_counter: u64,
}

impl ChatSession {
    /// Build a session around an already initialized chat store
    /// (see `ChatRepository::initialize`).
    pub fn new(user_id: impl Into<String>, mut chats: ChatStore, event_bus: EventBus) -> Self {
        chats.ensure_default();
        Self {
            config: SessionConfig::default(),
            chats,
            api_key: String::new(),
            user_id: user_id.into(),
            event_bus,
            state: TurnState::Idle,
            turn_counter: 0,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn chats(&self) -> &ChatStore {
        &self.chats
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // ─── API key ─────────────────────────────────────────────

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Store the key as typed. It is not checked until the first request.
    pub fn set_api_key(&mut self, key: impl Into<String>) {
        self.api_key = key.into();
    }

    pub fn phase(&self) -> SessionPhase {
        if self.api_key.trim().is_empty() {
            SessionPhase::NoApiKey
        } else {
            SessionPhase::Ready
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, TurnState::Streaming { .. })
    }

    // ─── Chat management ─────────────────────────────────────

    pub fn current_chat_id(&self) -> &str {
        &self.config.current_chat_id
    }

    pub fn current_messages(&self) -> &[Message] {
        self.chats.messages(&self.config.current_chat_id)
    }

    pub fn select_chat(&mut self, chat_id: &str) -> Result<()> {
        if !self.chats.contains(chat_id) {
            return Err(ChatError::ChatNotFound(chat_id.to_string()));
        }
        self.config.current_chat_id = chat_id.to_string();
        Ok(())
    }

    /// Create a chat (renamed on collision) and make it current
    pub fn create_chat(&mut self, name: &str) -> Result<PersistOp> {
        let chat_id = self.chats.create(name)?;
        log::info!("Created chat '{}'", chat_id);
        self.config.current_chat_id = chat_id.clone();
        Ok(PersistOp::Save { chat_id, messages: Vec::new() })
    }

    /// Delete a chat. The default chat is protected; deleting the current
    /// chat falls back to the default one.
    pub fn delete_chat(&mut self, chat_id: &str) -> Result<PersistOp> {
        self.chats.remove(chat_id)?;
        log::info!("Deleted chat '{}'", chat_id);
        if self.config.current_chat_id == chat_id {
            self.config.current_chat_id = DEFAULT_CHAT_ID.to_string();
        }
        Ok(PersistOp::Delete { chat_id: chat_id.to_string() })
    }

    // ─── Turns ───────────────────────────────────────────────

    /// Append the user message to the current chat and build the request.
    /// Fails without touching anything when no API key is set.
    pub fn begin_turn(&mut self, text: &str) -> Result<PendingTurn> {
        if self.phase() == SessionPhase::NoApiKey {
            return Err(ChatError::MissingApiKey);
        }
        if self.is_busy() {
            return Err(ChatError::Other("A reply is still streaming".to_string()));
        }
        if text.trim().is_empty() {
            return Err(ChatError::Other("Message is empty".to_string()));
        }

        let chat_id = self.config.current_chat_id.clone();
        self.chats.append(&chat_id, Message::user(text))?;

        self.turn_counter += 1;
        let turn_id = self.turn_counter;
        self.state = TurnState::Streaming { turn_id };
        self.event_bus.emit(ChatEvent::TurnStart {
            turn_id,
            chat_id: chat_id.clone(),
        });

        let request = ChatRequest {
            model: self.config.model.api_id().to_string(),
            system: self.config.system_prompt.clone(),
            messages: self.chats.messages(&chat_id).to_vec(),
            max_tokens: self.config.max_tokens(),
            temperature: self.config.temperature(),
        };

        Ok(PendingTurn { turn_id, chat_id, request })
    }

    /// Append the assistant reply and return the write that records it
    pub fn finish_turn(&mut self, turn: CompletedTurn) -> Result<PersistOp> {
        let appended = self.chats.append(&turn.chat_id, Message::assistant(&turn.text));
        if let Err(e) = appended {
            self.fail_turn(turn.turn_id, &e);
            return Err(e);
        }

        self.state = TurnState::Idle;
        self.event_bus.emit(ChatEvent::LlmComplete { text: turn.text });
        self.event_bus.emit(ChatEvent::TurnEnd { turn_id: turn.turn_id });

        Ok(PersistOp::Save {
            messages: self.chats.messages(&turn.chat_id).to_vec(),
            chat_id: turn.chat_id,
        })
    }

    /// Record a failed turn. The user message stays in the chat.
    pub fn fail_turn(&mut self, turn_id: u64, err: &ChatError) {
        log::error!("Turn {} failed: {}", turn_id, err);
        let message = error_message(err);
        self.state = TurnState::Error(message.clone());
        self.event_bus.emit(ChatEvent::Error { message });
        self.event_bus.emit(ChatEvent::TurnEnd { turn_id });
    }

    /// Surface any action failure as one generic error message.
    /// A turn that is still streaming stays in `Streaming`; only
    /// `finish_turn` or `fail_turn` end it.
    pub fn report_error(&mut self, err: &ChatError) {
        let message = error_message(err);
        if !matches!(self.state, TurnState::Streaming { .. }) {
            self.state = TurnState::Error(message.clone());
        }
        self.event_bus.emit(ChatEvent::Error { message });
    }

    /// Run one full turn: begin, stream, finish, persist.
    pub async fn run_turn(
        &mut self,
        text: &str,
        llm: &dyn LlmPort,
        repo: &ChatRepository,
    ) -> Result<()> {
        let pending = self.begin_turn(text)?;
        let turn_id = pending.turn_id;
        let bus = self.event_bus.clone();

        let completed = match pending.stream(llm, &bus).await {
            Ok(c) => c,
            Err(e) => {
                self.fail_turn(turn_id, &e);
                return Err(e);
            }
        };

        let op = self.finish_turn(completed)?;
        if let Err(e) = repo.apply(&op, &self.user_id).await {
            self.report_error(&e);
            return Err(e);
        }
        bus.emit(ChatEvent::Persisted { chat_id: op.chat_id().to_string() });
        Ok(())
    }
}

/// A turn whose user message is recorded and whose request is ready to send
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub turn_id: u64,
    pub chat_id: String,
    pub request: ChatRequest,
}

/// A turn whose reply has fully streamed
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTurn {
    pub turn_id: u64,
    pub chat_id: String,
    pub text: String,
}

impl PendingTurn {
    /// Send the request and concatenate the fragments, publishing each one
    /// as an `LlmDelta`. The first error aborts the turn.
    pub async fn stream(self, llm: &dyn LlmPort, bus: &EventBus) -> Result<CompletedTurn> {
        log::debug!(
            "Turn {}: {} message(s) to {} via {}",
            self.turn_id,
            self.request.messages.len(),
            self.request.model,
            llm.provider_name()
        );

        let mut stream = llm.stream_chat(self.request);
        let mut text = String::new();

        while let Some(event) = stream.next().await {
            match event {
                LlmStreamEvent::Delta(fragment) => {
                    text.push_str(&fragment);
                    bus.emit(ChatEvent::LlmDelta { token: fragment });
                }
                LlmStreamEvent::Done => break,
                LlmStreamEvent::Error(message) => return Err(ChatError::Llm(message)),
            }
        }

        Ok(CompletedTurn {
            turn_id: self.turn_id,
            chat_id: self.chat_id,
            text,
        })
    }
}
