//! Backend for Ollama's native API.
//!
//! [`OllamaBackend`] translates normalized [`LlmRequest`]s into Ollama's
//! `/api/generate` and `/api/chat` endpoints. The schema descriptor is sent
//! as the `format` JSON Schema so the model is constrained to it. Streaming
//! uses NDJSON with `{"response": "token"}` per line and a final
//! `{"done": true}` line.

use super::{frame_stream, send, Backend, ChunkStream, Frame, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::streaming::StreamingDecoder;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Backend for Ollama's native API.
///
/// This is the default backend.
///
/// # Endpoint selection
///
/// Uses `/api/chat` when a non-empty `system_prompt` is set, otherwise
/// `/api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaBackend;

impl OllamaBackend {
    fn build_options(request: &LlmRequest) -> Value {
        let mut opts = json!({
            "temperature": request.config.temperature,
            "num_predict": request.config.max_tokens,
        });
        if let Some(ref custom) = request.config.options {
            if let (Some(base), Some(extra)) = (opts.as_object_mut(), custom.as_object()) {
                for (k, v) in extra {
                    base.insert(k.clone(), v.clone());
                }
            }
        }
        opts
    }

    fn use_chat(request: &LlmRequest) -> bool {
        request
            .system_prompt
            .as_ref()
            .is_some_and(|s| !s.is_empty())
    }

    fn apply_format(body: &mut Value, request: &LlmRequest) {
        if let Some(ref schema) = request.schema {
            body["format"] = schema.to_json_schema();
        }
    }

    fn build_generate_body(request: &LlmRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": stream,
            "options": Self::build_options(request),
        });
        Self::apply_format(&mut body, request);
        body
    }

    fn build_chat_body(request: &LlmRequest, stream: bool) -> Value {
        let mut messages = Vec::new();
        if let Some(ref sys) = request.system_prompt {
            if !sys.is_empty() {
                messages.push(json!({"role": "system", "content": sys}));
            }
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": stream,
            "options": Self::build_options(request),
        });
        Self::apply_format(&mut body, request);
        body
    }

    fn endpoint(base_url: &str, request: &LlmRequest, stream: bool) -> (String, Value) {
        let base = base_url.trim_end_matches('/');
        if Self::use_chat(request) {
            (
                format!("{}/api/chat", base),
                Self::build_chat_body(request, stream),
            )
        } else {
            (
                format!("{}/api/generate", base),
                Self::build_generate_body(request, stream),
            )
        }
    }

    /// Text carried by one response object (either endpoint).
    fn token_of(json_val: &Value) -> Option<&str> {
        json_val
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .or_else(|| json_val.get("response").and_then(|r| r.as_str()))
    }

    fn frames_of(json_val: &Value) -> Vec<Frame> {
        if let Some(err) = json_val.get("error").and_then(|e| e.as_str()) {
            return vec![Frame::Failed(PipelineError::StreamInterrupted(format!(
                "ollama reported: {}",
                err
            )))];
        }
        let mut frames = Vec::new();
        if let Some(t) = Self::token_of(json_val) {
            frames.push(Frame::Token(t.to_string()));
        }
        if json_val.get("done").and_then(|v| v.as_bool()) == Some(true) {
            frames.push(Frame::Done);
        }
        frames
    }

    /// Decode closure handed to [`frame_stream`].
    fn ndjson_decoder() -> impl FnMut(Option<&[u8]>) -> Vec<Frame> + Send + 'static {
        let mut decoder = StreamingDecoder::new();
        move |chunk: Option<&[u8]>| match chunk {
            Some(bytes) => decoder
                .decode(bytes)
                .iter()
                .flat_map(Self::frames_of)
                .collect(),
            None => decoder
                .flush()
                .map(|v| Self::frames_of(&v))
                .unwrap_or_default(),
        }
    }

    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        for key in [
            "total_duration",
            "eval_count",
            "eval_duration",
            "prompt_eval_count",
            "model",
        ] {
            if let Some(v) = json_resp.get(key) {
                meta.insert(key.into(), v.clone());
            }
        }
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let (url, body) = Self::endpoint(base_url, request, false);
        let resp = send(client.post(&url).json(&body), &url).await?;
        let status = resp.status().as_u16();
        let json_resp: Value = resp.json().await?;

        Ok(LlmResponse {
            text: Self::token_of(&json_resp).unwrap_or("").to_string(),
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    async fn stream(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<ChunkStream> {
        let (url, body) = Self::endpoint(base_url, request, true);
        let resp = send(client.post(&url).json(&body), &url).await?;
        Ok(frame_stream(resp, Self::ndjson_decoder()))
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}
