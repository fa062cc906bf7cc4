//! OpenAI-style `/v1/chat/completions` transport.
//!
//! Any server speaking that dialect works: hosted OpenAI, vLLM, llama.cpp,
//! LM Studio, Groq, or Ollama's own `/v1/` layer. Requests are always chat
//! shaped; the schema descriptor rides along as a `json_schema` response
//! format and the stream is server-sent events ending in `data: [DONE]`.

use super::sse::SseDecoder;
use super::{frame_stream, send, Backend, ChunkStream, Frame, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Transport for OpenAI-compatible chat completion servers.
///
/// ```
/// use script_pipeline::backend::OpenAiBackend;
///
/// let hosted = OpenAiBackend::new().with_api_key("sk-...");
/// assert!(hosted.has_api_key());
/// ```
#[derive(Clone, Default)]
pub struct OpenAiBackend {
    /// Sent as a bearer token.
    pub(crate) api_key: Option<String>,
    /// Sent as `OpenAI-Organization`.
    pub(crate) organization: Option<String>,
}

// keys never reach logs in full
impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = self.api_key.as_deref().map(|k| match k.get(..6) {
            Some(prefix) if k.len() > 6 => format!("{}***", prefix),
            _ => "***".to_string(),
        });
        f.debug_struct("OpenAiBackend")
            .field("api_key", &key)
            .field("organization", &self.organization)
            .finish()
    }
}

impl OpenAiBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn has_organization(&self) -> bool {
        self.organization.is_some()
    }

    fn build_body(request: &LlmRequest, stream: bool) -> Value {
        let system = request
            .system_prompt
            .as_deref()
            .filter(|sys| !sys.is_empty())
            .map(|sys| json!({"role": "system", "content": sys}));
        let messages: Vec<Value> = system
            .into_iter()
            .chain(std::iter::once(json!({"role": "user", "content": request.prompt})))
            .collect();

        // `options` is Ollama vocabulary and has no equivalent here
        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.config.temperature,
            "max_tokens": request.config.max_tokens,
            "stream": stream,
        });
        if let Some(ref schema) = request.schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name(),
                    "schema": schema.to_json_schema(),
                    "strict": false,
                }
            });
        }
        body
    }

    fn post(&self, client: &Client, url: &str, body: &Value) -> reqwest::RequestBuilder {
        let req = client.post(url).json(body);
        let req = match self.api_key {
            Some(ref key) => req.bearer_auth(key),
            None => req,
        };
        match self.organization {
            Some(ref org) => req.header("OpenAI-Organization", org.as_str()),
            None => req,
        }
    }

    fn frames_of(json_val: &Value) -> Vec<Frame> {
        if let Some(err) = json_val.get("error") {
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown provider error");
            return vec![Frame::Failed(PipelineError::StreamInterrupted(
                message.to_string(),
            ))];
        }
        let choice = json_val.get("choices").and_then(|c| c.get(0));
        let mut frames = Vec::new();
        if let Some(content) = choice
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(|v| v.as_str())
        {
            frames.push(Frame::Token(content.to_string()));
        }
        frames
    }

    /// Decode closure handed to [`frame_stream`]; completion is `data: [DONE]`.
    fn sse_decoder() -> impl FnMut(Option<&[u8]>) -> Vec<Frame> + Send + 'static {
        let mut decoder = SseDecoder::new();
        move |chunk: Option<&[u8]>| {
            let values = match chunk {
                Some(bytes) => decoder.decode(bytes),
                None => decoder.flush(),
            };
            let mut frames: Vec<Frame> = values.iter().flat_map(Self::frames_of).collect();
            if decoder.is_done() {
                frames.push(Frame::Done);
            }
            frames
        }
    }

    fn usage_of(json_resp: &Value) -> Option<Value> {
        let meta: serde_json::Map<String, Value> = ["usage", "model", "id"]
            .into_iter()
            .filter_map(|key| json_resp.get(key).map(|v| (key.to_string(), v.clone())))
            .collect();
        (!meta.is_empty()).then_some(Value::Object(meta))
    }

    fn url(base_url: &str) -> String {
        format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let url = Self::url(base_url);
        let body = Self::build_body(request, false);
        let resp = send(self.post(client, &url, &body), &url).await?;
        let status = resp.status().as_u16();
        let json_resp: Value = resp.json().await?;

        let text = json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        Ok(LlmResponse {
            text,
            status,
            metadata: Self::usage_of(&json_resp),
        })
    }

    async fn stream(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<ChunkStream> {
        let url = Self::url(base_url);
        let body = Self::build_body(request, true);
        let resp = send(self.post(client, &url, &body), &url).await?;
        Ok(frame_stream(resp, Self::sse_decoder()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaDescriptor;

    fn test_request() -> LlmRequest {
        LlmRequest::new("gpt-4o", "Outline a series on tides.")
    }

    #[test]
    fn test_body_is_chat_shaped() {
        let request = test_request().with_system_prompt("You plan video series.");
        let body = OpenAiBackend::build_body(&request, false);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 8192);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Outline a series on tides.");
        assert!(body.get("response_format").is_none());

        let bare = OpenAiBackend::build_body(&test_request().with_system_prompt(""), false);
        assert_eq!(bare["messages"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_openai_backend_schema_response_format() {
        let request = test_request().with_schema(SchemaDescriptor::series_outline());
        let body = OpenAiBackend::build_body(&request, true);
        let rf = body.get("response_format").expect("response_format");
        assert_eq!(rf["type"], "json_schema");
        assert_eq!(rf["json_schema"]["name"], "series_outline");
        assert_eq!(rf["json_schema"]["schema"]["type"], "object");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_ollama_options_not_forwarded() {
        let mut request = test_request();
        request.config.options = Some(json!({"num_ctx": 4096}));
        let body = OpenAiBackend::build_body(&request, false);
        assert!(body.get("options").is_none());
        assert!(body.get("num_ctx").is_none());
    }

    #[test]
    fn test_sse_decoder_frames() {
        let mut decode = OpenAiBackend::sse_decoder();
        let frames = decode(Some(
            &b"data: {\"choices\":[{\"delta\":{\"content\":\"{\\\"a\"}}]}\n\ndata: {\"choi"[..],
        ));
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], Frame::Token(t) if t == "{\"a"));

        let frames = decode(Some(
            &b"ces\":[{\"delta\":{\"content\":\"\\\":1}\"}}]}\n\ndata: [DONE]\n\n"[..],
        ));
        assert!(matches!(&frames[0], Frame::Token(t) if t == "\":1}"));
        assert!(matches!(frames.last(), Some(Frame::Done)));
    }

    #[test]
    fn test_sse_decoder_without_done() {
        let mut decode = OpenAiBackend::sse_decoder();
        let frames = decode(Some(&b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n"[..]));
        assert_eq!(frames.len(), 1);
        assert!(decode(None).is_empty());
    }

    #[test]
    fn test_sse_decoder_error_event() {
        let mut decode = OpenAiBackend::sse_decoder();
        let frames = decode(Some(&b"data: {\"error\":{\"message\":\"overloaded\"}}\n"[..]));
        assert!(matches!(
            &frames[0],
            Frame::Failed(PipelineError::StreamInterrupted(m)) if m == "overloaded"
        ));
    }

    #[test]
    fn test_post_sets_auth_headers() {
        let backend = OpenAiBackend::new()
            .with_api_key("sk-series")
            .with_organization("org-shorts");
        let req = backend
            .post(&Client::new(), &OpenAiBackend::url("https://api.openai.com/"), &json!({}))
            .build()
            .unwrap();
        assert_eq!(req.url().path(), "/v1/chat/completions");
        assert_eq!(req.headers()["authorization"], "Bearer sk-series");
        assert_eq!(req.headers()["openai-organization"], "org-shorts");

        let anonymous = OpenAiBackend::new()
            .post(&Client::new(), "http://localhost:8000/v1/chat/completions", &json!({}))
            .build()
            .unwrap();
        assert!(anonymous.headers().get("authorization").is_none());
        assert!(!OpenAiBackend::new().has_organization());
    }

    #[test]
    fn test_debug_hides_key() {
        let shown = format!("{:?}", OpenAiBackend::new().with_api_key("sk-abcdef0123456789"));
        assert!(shown.contains("sk-abc***"));
        assert!(!shown.contains("0123456789"));
        assert!(format!("{:?}", OpenAiBackend::new().with_api_key("short")).contains("\"***\""));
    }

    #[test]
    fn test_usage_metadata() {
        let meta = OpenAiBackend::usage_of(&json!({"id": "c1", "choices": []})).unwrap();
        assert_eq!(meta["id"], "c1");
        assert!(meta.get("choices").is_none());
        assert!(OpenAiBackend::usage_of(&json!({})).is_none());
    }
}
