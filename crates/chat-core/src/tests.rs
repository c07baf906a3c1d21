#[cfg(test)]
mod tests {
    use crate::event_bus::EventBus;
    use crate::chat_store::ChatStore;
    use crate::persistence::{ChatRepository, PersistOp};
    use crate::session::*;
    use crate::ports::*;
    use chat_types::chat::*;
    use chat_types::config::*;
    use chat_types::event::ChatEvent;
    use chat_types::message::*;
    use chat_types::ChatError;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::pin::Pin;
    use std::rc::Rc;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use futures::Stream;

    // ─── Mocks ───────────────────────────────────────────────

    /// Mock LLM that replays a fixed list of stream events
    struct MockLlm {
        events: Vec<LlmStreamEvent>,
        calls: Cell<usize>,
        last_request: RefCell<Option<ChatRequest>>,
    }

    impl MockLlm {
        fn replying(fragments: &[&str]) -> Self {
            let mut events: Vec<LlmStreamEvent> = fragments
                .iter()
                .map(|f| LlmStreamEvent::Delta(f.to_string()))
                .collect();
            events.push(LlmStreamEvent::Done);
            Self::with_events(events)
        }

        fn with_events(events: Vec<LlmStreamEvent>) -> Self {
            Self {
                events,
                calls: Cell::new(0),
                last_request: RefCell::new(None),
            }
        }
    }

    impl LlmPort for MockLlm {
        fn stream_chat(
            &self,
            req: ChatRequest,
        ) -> Pin<Box<dyn Stream<Item = LlmStreamEvent>>> {
            self.calls.set(self.calls.get() + 1);
            *self.last_request.borrow_mut() = Some(req);
            Box::pin(futures::stream::iter(self.events.clone()))
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }

    /// Mock document store backed by a HashMap
    #[derive(Default)]
    struct MockStore {
        docs: RefCell<HashMap<String, ChatDocument>>,
        fail_writes: Cell<bool>,
    }

    #[async_trait(?Send)]
    impl DocumentStorePort for MockStore {
        async fn put(&self, doc_id: &str, doc: &ChatDocument) -> chat_types::Result<()> {
            if self.fail_writes.get() {
                return Err(ChatError::Storage("backend unreachable".to_string()));
            }
            self.docs.borrow_mut().insert(doc_id.to_string(), doc.clone());
            Ok(())
        }

        async fn delete(&self, doc_id: &str) -> chat_types::Result<()> {
            self.docs.borrow_mut().remove(doc_id);
            Ok(())
        }

        async fn query_by_user(&self, user_id: &str) -> chat_types::Result<Vec<(String, ChatDocument)>> {
            Ok(self
                .docs
                .borrow()
                .iter()
                .filter(|(_, d)| d.user_id == user_id)
                .map(|(k, d)| (k.clone(), d.clone()))
                .collect())
        }

        fn backend_name(&self) -> &str {
            "mock"
        }
    }

    fn repo_with_store() -> (ChatRepository, Rc<MockStore>) {
        let store = Rc::new(MockStore::default());
        (ChatRepository::new(store.clone()), store)
    }

    fn ready_session(bus: EventBus) -> ChatSession {
        let mut session = ChatSession::new(DEFAULT_USER_ID, ChatStore::new(), bus);
        session.set_api_key("sk-ant-test");
        session
    }

    // ─── EventBus Tests ──────────────────────────────────────

    #[test]
    fn test_event_bus_emit_and_drain() {
        let bus = EventBus::new();
        assert!(!bus.has_pending());
        bus.emit(ChatEvent::TurnStart { turn_id: 1, chat_id: "c".to_string() });
        bus.emit(ChatEvent::LlmComplete { text: "hello".to_string() });
        assert!(bus.has_pending());

        assert_eq!(bus.drain().len(), 2);
        assert!(!bus.has_pending());
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_event_bus_clone_shares_state() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();
        bus1.emit(ChatEvent::TurnEnd { turn_id: 1 });
        assert!(bus2.has_pending());
        assert_eq!(bus2.drain().len(), 1);
        assert!(!bus1.has_pending());
    }

    // ─── ChatStore Tests ─────────────────────────────────────

    #[test]
    fn test_create_unique_name() {
        let mut store = ChatStore::new();
        assert_eq!(store.create("Ideas").unwrap(), "Ideas");
        assert_eq!(store.ids().filter(|id| *id == "Ideas").count(), 1);
    }

    #[test]
    fn test_create_duplicate_names_get_suffix() {
        let mut store = ChatStore::new();
        assert_eq!(store.create("C").unwrap(), "C");
        assert_eq!(store.create("C").unwrap(), "C (1)");
        assert_eq!(store.create("C").unwrap(), "C (2)");
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_create_fills_smallest_free_suffix() {
        let mut store = ChatStore::from_chats(vec![
            Chat::new("C"),
            Chat::new("C (2)"),
        ]);
        assert_eq!(store.create("C").unwrap(), "C (1)");
        assert_eq!(store.create("C").unwrap(), "C (3)");
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let mut store = ChatStore::new();
        assert!(matches!(store.create("   "), Err(ChatError::InvalidChatName(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_default_is_rejected() {
        let mut store = ChatStore::new();
        store.ensure_default();
        let err = store.remove(DEFAULT_CHAT_ID).unwrap_err();
        assert!(matches!(err, ChatError::ProtectedChat(_)));
        assert!(store.contains(DEFAULT_CHAT_ID));
    }

    #[test]
    fn test_remove_unknown_chat() {
        let mut store = ChatStore::new();
        assert!(matches!(store.remove("nope"), Err(ChatError::ChatNotFound(_))));
    }

    #[test]
    fn test_append_keeps_order() {
        let mut store = ChatStore::new();
        store.ensure_default();
        store.append(DEFAULT_CHAT_ID, Message::user("1")).unwrap();
        store.append(DEFAULT_CHAT_ID, Message::assistant("2")).unwrap();
        let contents: Vec<&str> = store
            .messages(DEFAULT_CHAT_ID)
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["1", "2"]);
        assert!(store.append("missing", Message::user("x")).is_err());
    }

    #[test]
    fn test_ensure_default_is_idempotent() {
        let mut store = ChatStore::new();
        assert!(store.ensure_default());
        assert!(!store.ensure_default());
        assert_eq!(store.len(), 1);
    }

    // ─── ChatRepository Tests ────────────────────────────────

    #[test]
    fn test_load_chats_seeds_default_when_empty() {
        let (repo, store) = repo_with_store();
        let chats = block_on(repo.load_chats("default")).unwrap();
        assert_eq!(chats, vec![Chat::new(DEFAULT_CHAT_ID)]);
        assert!(store.docs.borrow().contains_key("default_Default Chat"));
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (repo, _store) = repo_with_store();
        let messages = vec![
            Message::user("What is Rust?"),
            Message::assistant("A systems language."),
            Message::user("Thanks"),
        ];
        block_on(repo.save_chat("Learning", &messages, "alice")).unwrap();

        let chats = block_on(repo.load_chats("alice")).unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].id, "Learning");
        assert_eq!(chats[0].messages, messages);
    }

    #[test]
    fn test_load_chats_scoped_by_user() {
        let (repo, _store) = repo_with_store();
        block_on(repo.save_chat("Mine", &[Message::user("a")], "alice")).unwrap();
        block_on(repo.save_chat("Theirs", &[Message::user("b")], "bob")).unwrap();

        let chats = block_on(repo.load_chats("alice")).unwrap();
        let ids: Vec<&str> = chats.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["Mine"]);
    }

    #[test]
    fn test_load_chats_keeps_user_prefix_inside_name() {
        let (repo, _store) = repo_with_store();
        block_on(repo.save_chat("default_notes", &[], "default")).unwrap();
        let chats = block_on(repo.load_chats("default")).unwrap();
        assert_eq!(chats[0].id, "default_notes");
    }

    #[test]
    fn test_initialize_adds_missing_default() {
        let (repo, store) = repo_with_store();
        block_on(repo.save_chat("Other", &[], "default")).unwrap();

        let chats = block_on(repo.initialize("default")).unwrap();
        assert!(chats.contains(DEFAULT_CHAT_ID));
        assert!(chats.contains("Other"));
        assert!(store.docs.borrow().contains_key("default_Default Chat"));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (repo, store) = repo_with_store();
        let first = block_on(repo.initialize("default")).unwrap();
        let second = block_on(repo.initialize("default")).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.docs.borrow().len(), 1);
    }

    #[test]
    fn test_save_propagates_backend_failure() {
        let (repo, store) = repo_with_store();
        store.fail_writes.set(true);
        let result = block_on(repo.save_chat("x", &[], "default"));
        assert!(matches!(result, Err(ChatError::Storage(_))));
    }

    #[test]
    fn test_apply_ops() {
        let (repo, store) = repo_with_store();
        let save = PersistOp::Save {
            chat_id: "Plans".to_string(),
            messages: vec![Message::user("hi")],
        };
        block_on(repo.apply(&save, "default")).unwrap();
        assert!(store.docs.borrow().contains_key("default_Plans"));

        let delete = PersistOp::Delete { chat_id: "Plans".to_string() };
        assert_eq!(delete.chat_id(), "Plans");
        block_on(repo.apply(&delete, "default")).unwrap();
        assert!(!store.docs.borrow().contains_key("default_Plans"));
    }

    // ─── ChatSession Tests ───────────────────────────────────

    #[test]
    fn test_session_starts_without_key() {
        let session = ChatSession::new(DEFAULT_USER_ID, ChatStore::new(), EventBus::new());
        assert_eq!(session.phase(), SessionPhase::NoApiKey);
        assert_eq!(session.state, TurnState::Idle);
        assert_eq!(session.current_chat_id(), DEFAULT_CHAT_ID);
        assert!(session.chats().contains(DEFAULT_CHAT_ID));
    }

    #[test]
    fn test_session_phase_follows_key() {
        let mut session = ChatSession::new(DEFAULT_USER_ID, ChatStore::new(), EventBus::new());
        session.set_api_key("   ");
        assert_eq!(session.phase(), SessionPhase::NoApiKey);
        session.set_api_key("not-even-a-real-key");
        assert_eq!(session.phase(), SessionPhase::Ready);
    }

    #[test]
    fn test_no_api_key_means_no_llm_call() {
        let (repo, _store) = repo_with_store();
        let mut session = ChatSession::new(DEFAULT_USER_ID, ChatStore::new(), EventBus::new());
        let llm = MockLlm::replying(&["never"]);

        let result = block_on(session.run_turn("Hello?", &llm, &repo));
        assert!(matches!(result, Err(ChatError::MissingApiKey)));
        assert_eq!(llm.calls.get(), 0);
        assert!(session.current_messages().is_empty());
    }

    #[test]
    fn test_send_appends_user_then_assistant() {
        let bus = EventBus::new();
        let (repo, store) = repo_with_store();
        let mut session = ready_session(bus.clone());
        let llm = MockLlm::replying(&["Hel", "lo, ", "world"]);

        block_on(session.run_turn("Hi", &llm, &repo)).unwrap();

        let messages = session.current_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::user("Hi"));
        assert_eq!(messages[1], Message::assistant("Hello, world"));
        assert_eq!(session.state, TurnState::Idle);
        assert_eq!(llm.calls.get(), 1);

        let saved = store.docs.borrow()["default_Default Chat"].clone();
        assert_eq!(saved.messages, messages);

        let events = bus.drain();
        let deltas: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::LlmDelta { token } => Some(token.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, vec!["Hel", "lo, ", "world"]);
        assert!(events.iter().any(|e| matches!(e, ChatEvent::LlmComplete { text } if text == "Hello, world")));
        assert!(events.iter().any(|e| matches!(e, ChatEvent::Persisted { .. })));
    }

    #[test]
    fn test_request_carries_config_and_history() {
        let (repo, _store) = repo_with_store();
        let mut session = ready_session(EventBus::new());
        session.config.model = ClaudeModel::Claude3Haiku;
        session.config.system_prompt = "Be brief.".to_string();
        session.config.set_temperature(0.3);
        session.config.set_max_tokens(2000);

        let llm = MockLlm::replying(&["one"]);
        block_on(session.run_turn("first", &llm, &repo)).unwrap();
        block_on(session.run_turn("second", &llm, &repo)).unwrap();

        let req = llm.last_request.borrow().clone().unwrap();
        assert_eq!(req.model, "claude-3-haiku-20240307");
        assert_eq!(req.system, "Be brief.");
        assert_eq!(req.max_tokens, 2000);
        assert!((req.temperature - 0.3).abs() < 1e-6);
        // Full history up to and including the new user message
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[2], Message::user("second"));
    }

    #[test]
    fn test_stream_error_keeps_user_message() {
        let bus = EventBus::new();
        let (repo, store) = repo_with_store();
        let mut session = ready_session(bus.clone());
        let llm = MockLlm::with_events(vec![
            LlmStreamEvent::Delta("partial".to_string()),
            LlmStreamEvent::Error("invalid x-api-key".to_string()),
        ]);

        let result = block_on(session.run_turn("Hi", &llm, &repo));
        assert!(matches!(result, Err(ChatError::Llm(_))));

        assert_eq!(session.current_messages(), &[Message::user("Hi")]);
        assert!(matches!(session.state, TurnState::Error(_)));
        assert!(!session.is_busy());
        assert!(store.docs.borrow().is_empty());

        let events = bus.drain();
        let error = events.iter().find_map(|e| match e {
            ChatEvent::Error { message } => Some(message.clone()),
            _ => None,
        });
        assert_eq!(error.unwrap(), "An error occurred: LLM error: invalid x-api-key");
        assert!(events.iter().any(|e| matches!(e, ChatEvent::TurnEnd { .. })));
    }

    #[test]
    fn test_session_recovers_after_error() {
        let (repo, _store) = repo_with_store();
        let mut session = ready_session(EventBus::new());
        let failing = MockLlm::with_events(vec![LlmStreamEvent::Error("boom".to_string())]);
        assert!(block_on(session.run_turn("one", &failing, &repo)).is_err());

        let ok = MockLlm::replying(&["fine"]);
        block_on(session.run_turn("two", &ok, &repo)).unwrap();
        assert_eq!(session.current_messages().len(), 3);
        assert_eq!(session.state, TurnState::Idle);
    }

    #[test]
    fn test_persist_failure_is_reported() {
        let bus = EventBus::new();
        let (repo, store) = repo_with_store();
        store.fail_writes.set(true);
        let mut session = ready_session(bus.clone());
        let llm = MockLlm::replying(&["ok"]);

        let result = block_on(session.run_turn("Hi", &llm, &repo));
        assert!(matches!(result, Err(ChatError::Storage(_))));
        // Both messages stay in memory
        assert_eq!(session.current_messages().len(), 2);
        assert!(bus.drain().iter().any(|e| matches!(e, ChatEvent::Error { .. })));
    }

    #[test]
    fn test_begin_turn_rejects_while_streaming() {
        let mut session = ready_session(EventBus::new());
        let _pending = session.begin_turn("one").unwrap();
        assert!(session.is_busy());
        assert!(session.begin_turn("two").is_err());
        assert_eq!(session.current_messages().len(), 1);
    }

    #[test]
    fn test_error_during_stream_keeps_turn_guard() {
        let bus = EventBus::new();
        let mut session = ready_session(bus.clone());
        let pending = session.begin_turn("one").unwrap();

        // A background save fails while the reply is still streaming
        session.report_error(&ChatError::Storage("offline".to_string()));
        assert!(session.is_busy());
        assert_eq!(session.state, TurnState::Streaming { turn_id: pending.turn_id });
        assert!(bus.drain().iter().any(|e| matches!(
            e,
            ChatEvent::Error { message } if message == "An error occurred: Storage error: offline"
        )));

        assert!(session.begin_turn("two").is_err());
        assert_eq!(session.current_messages(), &[Message::user("one")]);

        let llm = MockLlm::replying(&["done"]);
        let completed = block_on(pending.stream(&llm, &bus)).unwrap();
        session.finish_turn(completed).unwrap();
        assert_eq!(session.state, TurnState::Idle);
        assert!(session.begin_turn("two").is_ok());
    }

    #[test]
    fn test_fail_turn_ends_streaming() {
        let mut session = ready_session(EventBus::new());
        let pending = session.begin_turn("one").unwrap();
        session.fail_turn(pending.turn_id, &ChatError::Llm("overloaded".to_string()));
        assert!(!session.is_busy());
        assert_eq!(
            session.state,
            TurnState::Error("An error occurred: LLM error: overloaded".to_string())
        );
    }

    #[test]
    fn test_split_turn_appends_to_starting_chat() {
        let bus = EventBus::new();
        let mut session = ready_session(bus.clone());
        session.create_chat("Side").unwrap();
        let pending = session.begin_turn("question").unwrap();
        assert_eq!(pending.chat_id, "Side");

        let llm = MockLlm::replying(&["answer"]);
        let completed = block_on(pending.stream(&llm, &bus)).unwrap();
        session.select_chat(DEFAULT_CHAT_ID).unwrap();
        let op = session.finish_turn(completed).unwrap();

        assert_eq!(op.chat_id(), "Side");
        assert_eq!(session.chats().messages("Side").len(), 2);
        assert!(session.current_messages().is_empty());
    }

    #[test]
    fn test_create_chat_becomes_current() {
        let mut session = ready_session(EventBus::new());
        let op = session.create_chat("Plans").unwrap();
        assert_eq!(op, PersistOp::Save { chat_id: "Plans".to_string(), messages: vec![] });
        assert_eq!(session.current_chat_id(), "Plans");

        let op = session.create_chat("Plans").unwrap();
        assert_eq!(op.chat_id(), "Plans (1)");
        assert_eq!(session.current_chat_id(), "Plans (1)");
    }

    #[test]
    fn test_delete_current_chat_falls_back_to_default() {
        let (repo, store) = repo_with_store();
        let mut session = ready_session(EventBus::new());

        let op = session.create_chat("Temp").unwrap();
        block_on(repo.apply(&op, session.user_id())).unwrap();
        assert!(store.docs.borrow().contains_key("default_Temp"));

        let op = session.delete_chat("Temp").unwrap();
        block_on(repo.apply(&op, session.user_id())).unwrap();

        assert!(!session.chats().contains("Temp"));
        assert!(!store.docs.borrow().contains_key("default_Temp"));
        assert_eq!(session.current_chat_id(), DEFAULT_CHAT_ID);
    }

    #[test]
    fn test_delete_other_chat_keeps_current() {
        let mut session = ready_session(EventBus::new());
        session.create_chat("A").unwrap();
        session.create_chat("B").unwrap();
        session.delete_chat("A").unwrap();
        assert_eq!(session.current_chat_id(), "B");
    }

    #[test]
    fn test_delete_default_chat_rejected() {
        let mut session = ready_session(EventBus::new());
        assert!(matches!(
            session.delete_chat(DEFAULT_CHAT_ID),
            Err(ChatError::ProtectedChat(_))
        ));
        assert!(session.chats().contains(DEFAULT_CHAT_ID));
    }

    #[test]
    fn test_delete_uses_session_user() {
        let (repo, store) = repo_with_store();
        let mut session = ChatSession::new("alice", ChatStore::new(), EventBus::new());
        let op = session.create_chat("Mine").unwrap();
        block_on(repo.apply(&op, session.user_id())).unwrap();
        assert!(store.docs.borrow().contains_key("alice_Mine"));

        let op = session.delete_chat("Mine").unwrap();
        block_on(repo.apply(&op, session.user_id())).unwrap();
        assert!(store.docs.borrow().is_empty());
    }

    #[test]
    fn test_select_unknown_chat() {
        let mut session = ready_session(EventBus::new());
        assert!(session.select_chat("ghost").is_err());
        assert_eq!(session.current_chat_id(), DEFAULT_CHAT_ID);
    }
}
