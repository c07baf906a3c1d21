//! Anthropic Messages API adapter.
//!
//! Streams completions over SSE. Uses browser `fetch()` via gloo-net and
//! reads the response body incrementally from its `ReadableStream`.

use std::collections::VecDeque;
use std::pin::Pin;
use futures::stream::{self, Stream, StreamExt};
use gloo_net::http::{Request, Response};
use js_sys::{Reflect, Uint8Array};
use serde_json::{json, Value};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::ReadableStreamDefaultReader;

use chat_core::ports::{ChatRequest, LlmPort, LlmStreamEvent};
use chat_types::{
    ChatError, Result,
    config::LlmConfig,
};
use super::sse::{SseDecoder, SseEvent};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    config: LlmConfig,
}

impl AnthropicProvider {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url())
    }
}

impl LlmPort for AnthropicProvider {
    fn stream_chat(
        &self,
        req: ChatRequest,
    ) -> Pin<Box<dyn Stream<Item = LlmStreamEvent>>> {
        let url = self.url();
        let api_key = self.config.api_key.clone();
        let body = build_request_body(&req);

        let opened = async move {
            match open_stream(&url, &api_key, &body).await {
                Ok(reader) => body_events(reader).boxed_local(),
                Err(e) => {
                    log::warn!("Messages request failed: {}", e);
                    // The session wraps stream errors as ChatError::Llm itself
                    let message = match e {
                        ChatError::Llm(m) => m,
                        other => other.to_string(),
                    };
                    stream::once(async move { LlmStreamEvent::Error(message) }).boxed_local()
                }
            }
        };

        Box::pin(stream::once(opened).flatten())
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

/// JSON body for a streaming Messages API call
pub fn build_request_body(req: &ChatRequest) -> Value {
    let messages: Vec<Value> = req
        .messages
        .iter()
        .map(|m| {
            json!({
                "role": m.role.as_str(),
                "content": [{ "type": "text", "text": m.content }],
            })
        })
        .collect();

    json!({
        "model": req.model,
        "max_tokens": req.max_tokens,
        "temperature": req.temperature,
        "system": req.system,
        "messages": messages,
        "stream": true,
    })
}

/// Map one SSE event to a stream item. Events that carry no text
/// (`message_start`, `ping`, block boundaries, usage) map to None.
pub fn parse_stream_event(event: &SseEvent) -> Option<LlmStreamEvent> {
    let data: Value = match serde_json::from_str(&event.data) {
        Ok(v) => v,
        Err(e) => return Some(LlmStreamEvent::Error(format!("Malformed stream event: {}", e))),
    };

    match data["type"].as_str() {
        Some("content_block_delta") if data["delta"]["type"] == "text_delta" => data["delta"]["text"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(|t| LlmStreamEvent::Delta(t.to_string())),
        Some("message_stop") => Some(LlmStreamEvent::Done),
        Some("error") => Some(LlmStreamEvent::Error(
            data["error"]["message"]
                .as_str()
                .unwrap_or("unknown stream error")
                .to_string(),
        )),
        _ => None,
    }
}

/// Readable message out of a non-2xx response body
pub fn api_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .map(|m| format!("HTTP {}: {}", status, m))
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body))
}

/// Turns raw body bytes into stream items, stopping after the first
/// `Done` or `Error`.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    sse: SseDecoder,
    finished: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<LlmStreamEvent> {
        let events = self.sse.push(chunk);
        self.collect(events)
    }

    /// End of body. A body that ends without `message_stop` still ends in `Done`.
    pub fn finish(&mut self) -> Vec<LlmStreamEvent> {
        let events = self.sse.finish();
        let mut items = self.collect(events);
        if !self.finished {
            self.finished = true;
            items.push(LlmStreamEvent::Done);
        }
        items
    }

    fn collect(&mut self, events: impl IntoIterator<Item = SseEvent>) -> Vec<LlmStreamEvent> {
        let mut items = Vec::new();
        for event in events {
            if self.finished {
                break;
            }
            if let Some(item) = parse_stream_event(&event) {
                self.finished = matches!(item, LlmStreamEvent::Done | LlmStreamEvent::Error(_));
                items.push(item);
            }
        }
        items
    }
}

// ─── Transport ───────────────────────────────────────────────

async fn open_stream(url: &str, api_key: &str, body: &Value) -> Result<ReadableStreamDefaultReader> {
    log::debug!("POST {} (model {})", url, body["model"]);

    let response: Response = Request::post(url)
        .header("content-type", "application/json")
        .header("x-api-key", api_key)
        .header("anthropic-version", API_VERSION)
        .header("anthropic-dangerous-direct-browser-access", "true")
        .json(body)
        .map_err(|e| ChatError::Serialization(e.to_string()))?
        .send()
        .await
        .map_err(|e| ChatError::Network(e.to_string()))?;

    if !response.ok() {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(ChatError::Llm(api_error_message(status, &text)));
    }

    let body = response
        .body()
        .ok_or_else(|| ChatError::Llm("Response has no body".to_string()))?;
    Ok(body.get_reader().unchecked_into::<ReadableStreamDefaultReader>())
}

/// Next chunk of the body, or None at end of stream
async fn read_chunk(reader: &ReadableStreamDefaultReader) -> Result<Option<Vec<u8>>> {
    let result = JsFuture::from(reader.read())
        .await
        .map_err(|e| ChatError::Network(format!("{:?}", e)))?;

    let done = Reflect::get(&result, &JsValue::from_str("done"))
        .map_err(|e| ChatError::JsInterop(format!("{:?}", e)))?
        .as_bool()
        .unwrap_or(false);
    if done {
        return Ok(None);
    }

    let value = Reflect::get(&result, &JsValue::from_str("value"))
        .map_err(|e| ChatError::JsInterop(format!("{:?}", e)))?;
    Ok(Some(Uint8Array::new(&value).to_vec()))
}

struct BodyState {
    reader: ReadableStreamDefaultReader,
    decoder: StreamDecoder,
    queue: VecDeque<LlmStreamEvent>,
}

fn body_events(reader: ReadableStreamDefaultReader) -> impl Stream<Item = LlmStreamEvent> {
    let state = BodyState {
        reader,
        decoder: StreamDecoder::new(),
        queue: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.queue.pop_front() {
                return Some((item, state));
            }
            if state.decoder.is_finished() {
                return None;
            }
            match read_chunk(&state.reader).await {
                Ok(Some(bytes)) => state.queue.extend(state.decoder.push(&bytes)),
                Ok(None) => state.queue.extend(state.decoder.finish()),
                Err(e) => {
                    state.decoder.finished = true;
                    state.queue.push_back(LlmStreamEvent::Error(e.to_string()));
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::message::Message;

    fn sse(data: &str) -> SseEvent {
        SseEvent { event: None, data: data.to_string() }
    }

    #[test]
    fn test_request_body_shape() {
        let req = ChatRequest {
            model: "claude-3-haiku-20240307".to_string(),
            system: "You are a helpful AI assistant.".to_string(),
            messages: vec![Message::user("Hi"), Message::assistant("Hello"), Message::user("Bye")],
            max_tokens: 4000,
            temperature: 0.5,
        };
        let body = build_request_body(&req);
        assert_eq!(body["model"], "claude-3-haiku-20240307");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["system"], "You are a helpful AI assistant.");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(
            body["messages"][1],
            json!({"role": "assistant", "content": [{"type": "text", "text": "Hello"}]})
        );
    }

    #[test]
    fn test_parse_text_delta() {
        let ev = sse(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#);
        assert_eq!(parse_stream_event(&ev), Some(LlmStreamEvent::Delta("Hi".to_string())));
    }

    #[test]
    fn test_parse_ignores_non_text_events() {
        for data in [
            r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"}}"#,
        ] {
            assert_eq!(parse_stream_event(&sse(data)), None, "{}", data);
        }
    }

    #[test]
    fn test_parse_stop_and_error() {
        assert_eq!(parse_stream_event(&sse(r#"{"type":"message_stop"}"#)), Some(LlmStreamEvent::Done));
        let err = sse(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#);
        assert_eq!(parse_stream_event(&err), Some(LlmStreamEvent::Error("Overloaded".to_string())));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_stream_event(&sse("not json")), Some(LlmStreamEvent::Error(_))));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(api_error_message(401, body), "HTTP 401: invalid x-api-key");
        assert_eq!(api_error_message(502, "Bad Gateway"), "HTTP 502: Bad Gateway");
    }

    #[test]
    fn test_stream_decoder_full_body() {
        let body = concat!(
            "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{}}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" there\"}}\n\n",
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
            "event: ping\ndata: {\"type\":\"ping\"}\n\n",
        );
        let mut d = StreamDecoder::new();
        let mut items = Vec::new();
        // Feed in awkward 7-byte chunks
        for chunk in body.as_bytes().chunks(7) {
            items.extend(d.push(chunk));
        }
        items.extend(d.finish());
        assert_eq!(
            items,
            vec![
                LlmStreamEvent::Delta("Hello".to_string()),
                LlmStreamEvent::Delta(" there".to_string()),
                LlmStreamEvent::Done,
            ]
        );
    }

    #[test]
    fn test_stream_decoder_stops_after_error() {
        let body = concat!(
            "data: {\"type\":\"error\",\"error\":{\"message\":\"Overloaded\"}}\n\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"late\"}}\n\n",
        );
        let mut d = StreamDecoder::new();
        let mut items = d.push(body.as_bytes());
        items.extend(d.finish());
        assert_eq!(items, vec![LlmStreamEvent::Error("Overloaded".to_string())]);
    }

    #[test]
    fn test_stream_decoder_eof_without_stop() {
        let mut d = StreamDecoder::new();
        let mut items = d.push(b"data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"cut\"}}\n\n");
        items.extend(d.finish());
        assert_eq!(items, vec![LlmStreamEvent::Delta("cut".to_string()), LlmStreamEvent::Done]);
    }
}
