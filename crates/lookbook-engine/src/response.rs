use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::Value;

const FALLBACK_MEDIA_TYPE: &str = "image/png";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponsePart {
    InlineData {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(default, rename = "mimeType", alias = "mime_type")]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMedia {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl GeneratedMedia {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, BASE64.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmptyReason {
    pub candidates: usize,
    pub finish_reason: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseExtractor;

impl ResponseExtractor {
    pub fn new() -> Self {
        Self
    }

    /// First inline-data part of the first candidate. Later candidates are ignored.
    pub fn extract(&self, response: &Value) -> Option<GeneratedMedia> {
        let inline = first_candidate(response)
            .map(candidate_parts)
            .unwrap_or_default()
            .into_iter()
            .find_map(|part| match part {
                ResponsePart::InlineData { inline_data } => Some(inline_data),
                _ => None,
            })?;
        let bytes = BASE64.decode(inline.data.trim().as_bytes()).ok()?;
        if bytes.is_empty() {
            return None;
        }
        let media_type = inline
            .mime_type
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_string());
        Some(GeneratedMedia { bytes, media_type })
    }

    pub fn describe_empty(&self, response: &Value) -> EmptyReason {
        let candidates = response
            .get("candidates")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let Some(first) = first_candidate(response) else {
            return EmptyReason::default();
        };
        let finish_reason = first
            .get("finishReason")
            .or_else(|| first.get("finish_reason"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let text = candidate_parts(first)
            .into_iter()
            .filter_map(|part| match part {
                ResponsePart::Text { text } => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
        EmptyReason {
            candidates,
            finish_reason,
            text: Some(text).filter(|text| !text.is_empty()),
        }
    }
}

fn first_candidate(response: &Value) -> Option<&Value> {
    response.get("candidates")?.as_array()?.first()
}

// Parts are decoded one at a time so a malformed sibling cannot hide an image.
fn candidate_parts(candidate: &Value) -> Vec<ResponsePart> {
    candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| ResponsePart::deserialize(part).ok())
                .collect()
        })
        .unwrap_or_default()
}
