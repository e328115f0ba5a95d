use std::env;
use std::time::Duration;

use lookbook_contracts::session::GarmentPolicy;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_ASPECT_RATIO: &str = "9:16";
pub const DEFAULT_IMAGE_SIZE: &str = "1K";
const DEFAULT_REQUEST_TIMEOUT_S: f64 = 120.0;
const MIN_REQUEST_TIMEOUT_S: f64 = 15.0;
const MAX_REQUEST_TIMEOUT_S: f64 = 300.0;

#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub api_base: String,
    pub model: String,
    pub aspect_ratio: String,
    pub image_size: String,
    pub request_timeout_s: f64,
    pub require_credential_check: bool,
    pub garment_policy: GarmentPolicy,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_IMAGE_MODEL.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            request_timeout_s: DEFAULT_REQUEST_TIMEOUT_S,
            require_credential_check: false,
            garment_policy: GarmentPolicy::AnyGarment,
        }
    }
}

impl StudioConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            api_base: non_empty("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            model: non_empty("LOOKBOOK_IMAGE_MODEL").unwrap_or(defaults.model),
            aspect_ratio: non_empty("LOOKBOOK_ASPECT_RATIO").unwrap_or(defaults.aspect_ratio),
            image_size: non_empty("LOOKBOOK_IMAGE_SIZE")
                .map(|value| value.trim().to_ascii_uppercase())
                .unwrap_or(defaults.image_size),
            request_timeout_s: clamp_timeout(
                non_empty("LOOKBOOK_REQUEST_TIMEOUT").and_then(|value| value.parse::<f64>().ok()),
            ),
            require_credential_check: non_empty("LOOKBOOK_REQUIRE_CREDENTIAL_CHECK")
                .map(|value| parse_flag(&value))
                .unwrap_or(defaults.require_credential_check),
            garment_policy: non_empty("LOOKBOOK_GARMENT_POLICY")
                .and_then(|value| value.parse::<GarmentPolicy>().ok())
                .unwrap_or(defaults.garment_policy),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_image_config(
        mut self,
        aspect_ratio: impl Into<String>,
        image_size: impl Into<String>,
    ) -> Self {
        self.aspect_ratio = aspect_ratio.into();
        self.image_size = image_size.into().trim().to_ascii_uppercase();
        self
    }

    pub fn with_request_timeout(mut self, seconds: f64) -> Self {
        self.request_timeout_s = clamp_timeout(Some(seconds));
        self
    }

    pub fn with_require_credential_check(mut self, required: bool) -> Self {
        self.require_credential_check = required;
        self
    }

    pub fn with_garment_policy(mut self, policy: GarmentPolicy) -> Self {
        self.garment_policy = policy;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_s)
    }

    /// `{api_base}/models/{model}:generateContent`, tolerating a `models/` prefix on the id.
    pub fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

fn clamp_timeout(raw: Option<f64>) -> f64 {
    match raw {
        Some(value) if value.is_finite() => value.clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S),
        _ => DEFAULT_REQUEST_TIMEOUT_S,
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
