//! Google Gemini provider (primary)
//!
//! Talks to the `generativelanguage` REST API directly. Streaming uses the
//! server-sent-events form of `streamGenerateContent`. The same client also
//! backs the grounded web search in `search::gemini`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::provider::{GenerationRequest, TextGeneration, TextStream};
use crate::error::ProviderError;
use crate::fallback::Provider;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const PROVIDER: &str = "Gemini";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    pub content: Option<Content>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Part {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroundingChunk {
    pub web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WebChunk {
    pub uri: Option<String>,
    pub title: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Gemini text generation
///
/// `timeout` bounds a whole `generateContent` call. A streamed report has no
/// total limit; it only fails when the connection stalls for longer than
/// `timeout` between reads.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout,
            client,
        }
    }

    /// Point the provider at another endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, self.model, method)
    }

    pub(crate) fn request_body(request: &GenerationRequest) -> Value {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }]
        });

        if let Some(instruction) = &request.system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
        }

        let mut generation = serde_json::Map::new();
        if request.json_mode {
            generation.insert("responseMimeType".to_string(), json!("application/json"));
        }
        if let Some(budget) = request.thinking_budget {
            generation.insert("thinkingConfig".to_string(), json!({ "thinkingBudget": budget }));
        }
        if !generation.is_empty() {
            body["generationConfig"] = Value::Object(generation);
        }

        body
    }

    pub(crate) async fn generate_content(
        &self,
        body: &Value,
    ) -> Result<GenerateContentResponse, ProviderError> {
        debug!(model = %self.model, "Gemini generateContent");

        let response = self
            .client
            .post(self.endpoint("generateContent"))
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(PROVIDER, status.as_u16(), text));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ProviderError::Parse {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })
    }
}

impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl TextGeneration for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let body = Self::request_body(request);
        Ok(self.generate_content(&body).await?.text())
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TextStream, ProviderError> {
        let body = Self::request_body(request);

        let response = self
            .client
            .post(self.endpoint("streamGenerateContent"))
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(PROVIDER, status.as_u16(), text));
        }

        Ok(sse_text_stream(response.bytes_stream()))
    }
}

struct SseState<S> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

/// Decode a Gemini SSE byte stream into non-empty text chunks.
pub(crate) fn sse_text_stream<S, B>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    TextStream::new(futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.pending.pop_front() {
                return Some((Ok(text), st));
            }
            if st.finished {
                return None;
            }

            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    st.buffer.extend_from_slice(chunk.as_ref());
                    while let Some(pos) = st.buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = st.buffer.drain(..=pos).collect();
                        match parse_sse_line(&String::from_utf8_lossy(&line)) {
                            Ok(Some(text)) => st.pending.push_back(text),
                            Ok(None) => {}
                            Err(e) => {
                                st.finished = true;
                                return Some((Err(e), st));
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((
                        Err(ProviderError::Stream {
                            provider: PROVIDER.to_string(),
                            message: e.to_string(),
                        }),
                        st,
                    ));
                }
                None => {
                    st.finished = true;
                    let rest = std::mem::take(&mut st.buffer);
                    if let Ok(Some(text)) = parse_sse_line(&String::from_utf8_lossy(&rest)) {
                        st.pending.push_back(text);
                    }
                }
            }
        }
    }))
}

fn parse_sse_line(line: &str) -> Result<Option<String>, ProviderError> {
    let Some(payload) = line.trim().strip_prefix("data:") else {
        return Ok(None);
    };

    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return Ok(None);
    }

    let response: GenerateContentResponse =
        serde_json::from_str(payload).map_err(|e| ProviderError::Stream {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;

    let text = response.text();
    Ok((!text.is_empty()).then_some(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new("test-key", DEFAULT_GEMINI_MODEL, Duration::from_secs(5))
            .with_base_url(server.uri())
    }

    #[test]
    fn test_request_body_options() {
        let request = GenerationRequest::new("hello")
            .with_system("be brief")
            .json()
            .with_thinking_budget(Some(1024));

        let body = GeminiProvider::request_body(&request);

        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 1024);
    }

    #[test]
    fn test_plain_request_has_no_generation_config() {
        let body = GeminiProvider::request_body(&GenerationRequest::new("hello"));
        assert!(body.get("generationConfig").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_sse_line() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"Hi"}]}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), Some("Hi".to_string()));
        assert_eq!(parse_sse_line("").unwrap(), None);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), None);
        assert!(parse_sse_line("data: {not json").is_err());
    }

    #[tokio::test]
    async fn test_generate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "[\"a\", " }, { "text": "\"b\"]" }] } }]
            })))
            .mount(&server)
            .await;

        let text = provider(&server).generate(&GenerationRequest::new("plan")).await.unwrap();
        assert_eq!(text, "[\"a\", \"b\"]");
    }

    #[tokio::test]
    async fn test_generate_maps_auth_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = provider(&server).generate(&GenerationRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_generate_stream_decodes_events() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hello \"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"world\"}]}}]}\r\n\r\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let stream = provider(&server)
            .generate_stream(&GenerationRequest::new("write"))
            .await
            .unwrap();
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;

        assert_eq!(chunks, vec!["Hello ".to_string(), "world".to_string()]);
    }

    /// Serve one SSE response over raw TCP, writing `chunks` with `gap`
    /// between them. Returns the base URL.
    async fn slow_sse_server(chunks: Vec<String>, gap: Duration) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Consume the whole request before answering.
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
                )
                .await
                .unwrap();
            // The client may hang up first when it gives up on a stall.
            for chunk in chunks {
                tokio::time::sleep(gap).await;
                let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                if socket.write_all(frame.as_bytes()).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.flush().await;
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_slow_stream_outlives_request_timeout() {
        let chunks: Vec<String> = (0..4)
            .map(|i| {
                format!(
                    "data: {{\"candidates\":[{{\"content\":{{\"parts\":[{{\"text\":\"chunk{i} \"}}]}}}}]}}\r\n\r\n"
                )
            })
            .collect();
        // Every gap is under the timeout, the whole stream is well over it.
        let base_url = slow_sse_server(chunks, Duration::from_millis(600)).await;

        let provider = GeminiProvider::new("test-key", DEFAULT_GEMINI_MODEL, Duration::from_secs(1))
            .with_base_url(base_url);
        let stream = provider
            .generate_stream(&GenerationRequest::new("write"))
            .await
            .unwrap();
        let items: Vec<Result<String, ProviderError>> = stream.collect().await;

        assert!(items.iter().all(|item| item.is_ok()), "stream failed: {items:?}");
        let text: String = items.into_iter().map(|item| item.unwrap()).collect();
        assert_eq!(text, "chunk0 chunk1 chunk2 chunk3 ");
    }

    #[tokio::test]
    async fn test_stalled_stream_fails() {
        let chunk = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"late\"}]}}]}\r\n\r\n";
        let base_url = slow_sse_server(vec![chunk.to_string()], Duration::from_millis(1500)).await;

        let provider = GeminiProvider::new("test-key", DEFAULT_GEMINI_MODEL, Duration::from_millis(300))
            .with_base_url(base_url);
        let stream = provider
            .generate_stream(&GenerationRequest::new("write"))
            .await
            .unwrap();
        let items: Vec<Result<String, ProviderError>> = stream.collect().await;

        assert!(items.iter().any(|item| item.is_err()));
    }
}
