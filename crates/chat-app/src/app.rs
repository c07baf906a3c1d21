//! Main egui application: composes the panels and drives the chat session.

use std::cell::RefCell;
use std::rc::Rc;

use egui::{self, CentralPanel, RichText, SidePanel};

use chat_core::chat_store::ChatStore;
use chat_core::event_bus::EventBus;
use chat_core::persistence::{ChatRepository, PersistOp};
use chat_core::ports::LlmPort;
use chat_core::session::{error_message, ChatSession, SessionPhase};
use chat_platform::config::{load_app_config, CONFIG_URL};
use chat_platform::llm::AnthropicProvider;
use chat_platform::storage::{auto_detect_storage, MemoryStorage};
use chat_types::chat::DEFAULT_CHAT_ID;
use chat_types::config::LlmConfig;
use chat_types::event::ChatEvent;
use chat_types::ChatError;
use chat_ui::panels::chat::{self, ChatView};
use chat_ui::panels::sidebar::{self, ChatList, SidebarAction};
use chat_ui::state::UiState;
use chat_ui::theme;

/// Everything that exists once config and storage are loaded
struct Loaded {
    session: Rc<RefCell<ChatSession>>,
    repo: Rc<ChatRepository>,
    anthropic_base_url: Option<String>,
}

/// The main application state
pub struct ChatApp {
    ui_state: UiState,
    event_bus: EventBus,
    /// Filled by the startup task
    pending: Rc<RefCell<Option<Loaded>>>,
    loaded: Option<Loaded>,
    llm: Option<Rc<dyn LlmPort>>,
    first_frame: bool,
}

impl ChatApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let app = Self {
            ui_state: UiState::new(),
            event_bus: EventBus::new(),
            pending: Rc::new(RefCell::new(None)),
            loaded: None,
            llm: None,
            first_frame: true,
        };

        Self::start_loading(app.pending.clone(), app.event_bus.clone(), cc.egui_ctx.clone());
        app
    }

    /// Load config, pick the storage backend and initialize the chats (async)
    fn start_loading(slot: Rc<RefCell<Option<Loaded>>>, event_bus: EventBus, ctx: egui::Context) {
        wasm_bindgen_futures::spawn_local(async move {
            let config = load_app_config(CONFIG_URL).await;

            let storage = match auto_detect_storage(&config).await {
                Ok(s) => s,
                Err(e) => {
                    log::error!("Storage backend failed ({}), using memory", e);
                    event_bus.emit(ChatEvent::Error { message: error_message(&e) });
                    Rc::new(MemoryStorage::new())
                }
            };
            let repo = ChatRepository::new(storage);

            let chats = match repo.initialize(&config.user_id).await {
                Ok(chats) => chats,
                Err(e) => {
                    log::error!("Loading chats failed: {}", e);
                    event_bus.emit(ChatEvent::Error { message: error_message(&e) });
                    ChatStore::new()
                }
            };

            log::info!(
                "Session ready: user '{}', {} chat(s) on {}",
                config.user_id,
                chats.len(),
                repo.backend_name()
            );
            let session = ChatSession::new(config.user_id.clone(), chats, event_bus);

            *slot.borrow_mut() = Some(Loaded {
                session: Rc::new(RefCell::new(session)),
                repo: Rc::new(repo),
                anthropic_base_url: config.anthropic_base_url,
            });
            ctx.request_repaint();
        });
    }

    fn rebuild_llm(&mut self, api_key: &str) {
        let base = self.loaded.as_ref().and_then(|l| l.anthropic_base_url.clone());
        self.llm = if api_key.is_empty() {
            None
        } else {
            let provider = AnthropicProvider::new(LlmConfig {
                api_key: api_key.to_string(),
                api_base: base,
            });
            Some(Rc::new(provider))
        };
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.first_frame {
            theme::apply_theme(ctx);
            self.first_frame = false;
        }

        if self.loaded.is_none() {
            self.loaded = self.pending.borrow_mut().take();
        }

        // Drain events from the session
        if self.event_bus.has_pending() {
            self.ui_state.process_events(self.event_bus.drain());
            ctx.request_repaint();
        }

        if self.ui_state.is_busy() {
            ctx.request_repaint();
        }

        let (session, repo) = match &self.loaded {
            Some(l) => (l.session.clone(), l.repo.clone()),
            None => {
                CentralPanel::default().show(ctx, |ui| {
                    ui.centered_and_justified(|ui| {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label(RichText::new("Loading chats...").color(theme::TEXT_SECONDARY));
                        });
                    });
                });
                return;
            }
        };

        // ── Sidebar ──────────────────────────────────────────
        let action = {
            let mut s = session.borrow_mut();
            let ids: Vec<String> = s.chats().ids().map(str::to_string).collect();
            let current = s.current_chat_id().to_string();
            let list = ChatList {
                ids: ids.iter().map(String::as_str).collect(),
                current: &current,
                default_id: DEFAULT_CHAT_ID,
            };
            let ui_state = &mut self.ui_state;
            SidePanel::left("sidebar")
                .min_width(260.0)
                .max_width(340.0)
                .show(ctx, |ui| sidebar::sidebar_panel(ui, ui_state, &mut s.config, &list))
                .inner
        };

        if let Some(action) = action {
            self.handle_sidebar_action(action, &session, &repo, ctx);
        }

        // ── Chat ─────────────────────────────────────────────
        let submitted = {
            let s = session.borrow();
            let view = ChatView {
                chat_id: s.current_chat_id(),
                messages: s.current_messages(),
                config: &s.config,
                has_api_key: s.phase() == SessionPhase::Ready,
            };
            let ui_state = &mut self.ui_state;
            CentralPanel::default()
                .show(ctx, |ui| chat::chat_panel(ui, ui_state, &view))
                .inner
        };

        if let Some(text) = submitted {
            self.dispatch_message(text, &session, &repo, ctx);
        }
    }
}

impl ChatApp {
    fn handle_sidebar_action(
        &mut self,
        action: SidebarAction,
        session: &Rc<RefCell<ChatSession>>,
        repo: &Rc<ChatRepository>,
        ctx: &egui::Context,
    ) {
        match action {
            SidebarAction::ApiKeyChanged(key) => {
                log::debug!("API key updated ({} chars)", key.len());
                session.borrow_mut().set_api_key(&key);
                self.rebuild_llm(&key);
            }
            SidebarAction::SelectChat(id) => {
                let mut s = session.borrow_mut();
                match s.select_chat(&id) {
                    Ok(()) => self.ui_state.reset_transcript_view(),
                    Err(e) => s.report_error(&e),
                }
            }
            SidebarAction::CreateChat(name) => {
                let result = session.borrow_mut().create_chat(&name);
                self.after_mutation(result, session, repo, ctx);
            }
            SidebarAction::DeleteChat(id) => {
                let result = session.borrow_mut().delete_chat(&id);
                self.after_mutation(result, session, repo, ctx);
            }
        }
    }

    /// Persist a successful chat mutation, or surface its error
    fn after_mutation(
        &mut self,
        result: chat_types::Result<PersistOp>,
        session: &Rc<RefCell<ChatSession>>,
        repo: &Rc<ChatRepository>,
        ctx: &egui::Context,
    ) {
        match result {
            Ok(op) => {
                self.ui_state.reset_transcript_view();
                Self::spawn_persist(op, session.clone(), repo.clone(), ctx.clone());
            }
            Err(e) => session.borrow_mut().report_error(&e),
        }
    }

    /// Write a persistence op in the background (fire-and-forget)
    fn spawn_persist(
        op: PersistOp,
        session: Rc<RefCell<ChatSession>>,
        repo: Rc<ChatRepository>,
        ctx: egui::Context,
    ) {
        wasm_bindgen_futures::spawn_local(async move {
            persist(&op, &session, &repo).await;
            ctx.request_repaint();
        });
    }

    /// Run one turn: begin now, stream and finish in a background task.
    /// The session is only borrowed between awaits.
    fn dispatch_message(
        &self,
        text: String,
        session: &Rc<RefCell<ChatSession>>,
        repo: &Rc<ChatRepository>,
        ctx: &egui::Context,
    ) {
        let Some(llm) = self.llm.clone() else {
            session.borrow_mut().report_error(&ChatError::MissingApiKey);
            return;
        };

        let pending = {
            let mut s = session.borrow_mut();
            match s.begin_turn(&text) {
                Ok(p) => p,
                Err(e) => {
                    s.report_error(&e);
                    return;
                }
            }
        };

        let session = session.clone();
        let repo = repo.clone();
        let bus = self.event_bus.clone();
        let ctx = ctx.clone();

        wasm_bindgen_futures::spawn_local(async move {
            let turn_id = pending.turn_id;
            let streamed = pending.stream(llm.as_ref(), &bus).await;

            let op = {
                let mut s = session.borrow_mut();
                match streamed {
                    Ok(completed) => s.finish_turn(completed).ok(),
                    Err(e) => {
                        s.fail_turn(turn_id, &e);
                        None
                    }
                }
            };

            if let Some(op) = op {
                persist(&op, &session, &repo).await;
            }
            ctx.request_repaint();
        });
    }
}

async fn persist(op: &PersistOp, session: &Rc<RefCell<ChatSession>>, repo: &ChatRepository) {
    let user_id = session.borrow().user_id().to_string();
    match repo.apply(op, &user_id).await {
        Ok(()) => session
            .borrow()
            .event_bus()
            .emit(ChatEvent::Persisted { chat_id: op.chat_id().to_string() }),
        Err(e) => {
            log::error!("Persisting '{}' failed: {}", op.chat_id(), e);
            session.borrow_mut().report_error(&e);
        }
    }
}
