use std::time::Duration;

use lookbook_contracts::runs::receipts::PartCounts;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use crate::config::StudioConfig;
use crate::error::DispatchError;
use crate::media::MediaPayload;

const ERROR_BODY_MAX_CHARS: usize = 512;

pub trait GenerationTransport {
    fn post(
        &self,
        endpoint: &str,
        api_key: Option<&str>,
        payload: &Value,
        timeout: Duration,
    ) -> Result<Value, DispatchError>;
}

pub struct GeminiTransport {
    http: HttpClient,
}

impl GeminiTransport {
    pub fn new() -> Self {
        Self {
            http: HttpClient::new(),
        }
    }
}

impl Default for GeminiTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationTransport for GeminiTransport {
    fn post(
        &self,
        endpoint: &str,
        api_key: Option<&str>,
        payload: &Value,
        timeout: Duration,
    ) -> Result<Value, DispatchError> {
        let mut request = self.http.post(endpoint).timeout(timeout).json(payload);
        if let Some(key) = api_key {
            request = request.query(&[("key", key)]);
        }
        // `without_url` keeps the key query parameter out of error text.
        let response = request.send().map_err(|err| {
            DispatchError::transport(format!("Gemini request failed: {}", err.without_url()))
        })?;

        let code = response.status().as_u16();
        let success = response.status().is_success();
        let body = response.text().map_err(|err| {
            DispatchError::transport(format!(
                "Gemini response body read failed: {}",
                err.without_url()
            ))
        })?;
        if !success {
            return Err(DispatchError::http(code, provider_error_message(&body)));
        }
        serde_json::from_str(&body).map_err(|err| {
            DispatchError::http(code, format!("Gemini returned invalid JSON payload: {err}"))
        })
    }
}

fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|parsed| {
            parsed
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_text(body.trim(), ERROR_BODY_MAX_CHARS))
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub instruction: String,
    pub tops: Vec<MediaPayload>,
    pub bottoms: Vec<MediaPayload>,
    pub accessory: Option<MediaPayload>,
}

impl GenerationRequest {
    /// Instruction first, then tops, bottoms and the accessory image.
    pub fn parts(&self) -> Vec<Value> {
        let mut parts = vec![json!({ "text": self.instruction })];
        parts.extend(self.tops.iter().map(MediaPayload::to_part));
        parts.extend(self.bottoms.iter().map(MediaPayload::to_part));
        parts.extend(self.accessory.iter().map(MediaPayload::to_part));
        parts
    }

    pub fn part_counts(&self) -> PartCounts {
        PartCounts {
            tops: self.tops.len(),
            bottoms: self.bottoms.len(),
            accessory: self.accessory.is_some(),
        }
    }
}

pub struct RequestDispatcher {
    transport: Box<dyn GenerationTransport>,
    endpoint: String,
    aspect_ratio: String,
    image_size: String,
    timeout: Duration,
}

impl RequestDispatcher {
    pub fn new(config: &StudioConfig, transport: Box<dyn GenerationTransport>) -> Self {
        Self {
            transport,
            endpoint: config.endpoint(),
            aspect_ratio: config.aspect_ratio.clone(),
            image_size: config.image_size.clone(),
            timeout: config.request_timeout(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn build_payload(&self, request: &GenerationRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": request.parts(),
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": {
                    "aspectRatio": self.aspect_ratio,
                    "imageSize": self.image_size,
                },
            },
        })
    }

    pub fn dispatch(&self, payload: &Value, api_key: Option<&str>) -> Result<Value, DispatchError> {
        self.transport
            .post(&self.endpoint, api_key, payload, self.timeout)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::{provider_error_message, GenerationRequest, GenerationTransport, RequestDispatcher};
    use crate::config::StudioConfig;
    use crate::error::DispatchError;
    use crate::media::MediaPayload;

    #[derive(Debug, Clone)]
    pub(crate) struct RecordedCall {
        pub endpoint: String,
        pub api_key: Option<String>,
        pub payload: Value,
    }

    pub(crate) struct RecordingTransport {
        pub reply: Result<Value, DispatchError>,
        pub calls: Rc<RefCell<Vec<RecordedCall>>>,
    }

    impl RecordingTransport {
        pub(crate) fn new(reply: Result<Value, DispatchError>) -> Self {
            Self {
                reply,
                calls: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl GenerationTransport for RecordingTransport {
        fn post(
            &self,
            endpoint: &str,
            api_key: Option<&str>,
            payload: &Value,
            _timeout: Duration,
        ) -> Result<Value, DispatchError> {
            self.calls.borrow_mut().push(RecordedCall {
                endpoint: endpoint.to_string(),
                api_key: api_key.map(str::to_string),
                payload: payload.clone(),
            });
            self.reply.clone()
        }
    }

    fn payload(tag: &str) -> MediaPayload {
        MediaPayload::from_bytes(tag.as_bytes(), "image/png")
    }

    #[test]
    fn parts_keep_instruction_then_category_order() {
        let request = GenerationRequest {
            instruction: "dress the model".to_string(),
            tops: vec![payload("t1"), payload("t2")],
            bottoms: vec![payload("b1")],
            accessory: Some(payload("s1")),
        };
        let parts = request.parts();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], json!({ "text": "dress the model" }));
        let data = parts[1..]
            .iter()
            .map(|part| part["inlineData"]["data"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        let expected = [
            payload("t1"),
            payload("t2"),
            payload("b1"),
            payload("s1"),
        ]
        .into_iter()
        .map(|item| item.data)
        .collect::<Vec<_>>();
        assert_eq!(data, expected);

        let counts = request.part_counts();
        assert_eq!((counts.tops, counts.bottoms, counts.accessory), (2, 1, true));
    }

    #[test]
    fn dispatch_posts_once_with_image_config() {
        let transport = RecordingTransport::new(Ok(json!({ "candidates": [] })));
        let calls = transport.calls.clone();
        let config = StudioConfig::new().with_api_base("https://proxy.test/v1beta");
        let dispatcher = RequestDispatcher::new(&config, Box::new(transport));

        let request = GenerationRequest {
            instruction: "hello".to_string(),
            tops: vec![payload("t1")],
            ..GenerationRequest::default()
        };
        let body = dispatcher.build_payload(&request);
        let reply = dispatcher.dispatch(&body, Some("k-1"));
        assert!(reply.is_ok());

        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].endpoint,
            "https://proxy.test/v1beta/models/gemini-3-pro-image-preview:generateContent"
        );
        assert_eq!(calls[0].api_key.as_deref(), Some("k-1"));
        let sent = &calls[0].payload;
        assert_eq!(sent["contents"][0]["role"], "user");
        assert_eq!(sent["generationConfig"]["responseModalities"], json!(["IMAGE"]));
        assert_eq!(sent["generationConfig"]["imageConfig"]["aspectRatio"], "9:16");
        assert_eq!(sent["generationConfig"]["imageConfig"]["imageSize"], "1K");
    }

    #[test]
    fn dispatch_errors_pass_through_untouched() {
        let err = DispatchError::http(404, "Requested entity was not found.");
        let dispatcher = RequestDispatcher::new(
            &StudioConfig::new(),
            Box::new(RecordingTransport::new(Err(err.clone()))),
        );
        assert_eq!(dispatcher.dispatch(&json!({}), None), Err(err));
    }

    #[test]
    fn provider_error_message_prefers_structured_message() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        assert_eq!(provider_error_message(body), "Requested entity was not found.");
        assert_eq!(provider_error_message("  upstream exploded  "), "upstream exploded");
        let long = "x".repeat(600);
        assert_eq!(provider_error_message(&long).chars().count(), 513);
    }
}
