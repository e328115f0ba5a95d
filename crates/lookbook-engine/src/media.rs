use std::fs;
use std::path::Path;
use std::thread;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use lookbook_contracts::session::{ImageSource, UploadedImage};
use serde_json::{json, Value};

use crate::error::EncodeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub media_type: String,
    pub data: String,
}

impl MediaPayload {
    pub fn from_bytes(bytes: &[u8], media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    pub fn to_part(&self) -> Value {
        json!({
            "inlineData": {
                "mimeType": self.media_type,
                "data": self.data,
            }
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MediaEncoder;

impl MediaEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, image: &UploadedImage) -> Result<MediaPayload, EncodeError> {
        let label = image.label();
        let bytes = match &image.source {
            ImageSource::Path(path) => fs::read(path)
                .map_err(|err| EncodeError::new(&label, format!("read failed: {err}")))?,
            ImageSource::Bytes(bytes) => bytes.clone(),
        };
        if bytes.is_empty() {
            return Err(EncodeError::new(label, "file is empty"));
        }
        let media_type =
            resolve_media_type(image, &bytes).map_err(|msg| EncodeError::new(&label, msg))?;
        Ok(MediaPayload::from_bytes(&bytes, media_type))
    }

    /// Encodes every image, reading them concurrently. Output order always
    /// matches input order; the first failure (in input order) wins.
    pub fn encode_all(&self, images: &[UploadedImage]) -> Result<Vec<MediaPayload>, EncodeError> {
        if images.len() <= 1 {
            return images.iter().map(|image| self.encode(image)).collect();
        }
        thread::scope(|scope| {
            let handles = images
                .iter()
                .map(|image| scope.spawn(move || self.encode(image)))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .zip(images)
                .map(|(handle, image)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(EncodeError::new(image.label(), "encoder thread panicked"))
                    })
                })
                .collect()
        })
    }
}

fn resolve_media_type(image: &UploadedImage, bytes: &[u8]) -> Result<String, String> {
    if let Some(declared) = image.media_type.as_deref() {
        let lowered = declared.to_ascii_lowercase();
        if !lowered.starts_with("image/") {
            return Err(format!("unsupported media type '{declared}'"));
        }
        return Ok(lowered);
    }
    if let Ok(format) = image::guess_format(bytes) {
        return Ok(format.to_mime_type().to_string());
    }
    image
        .path()
        .and_then(mime_for_path)
        .map(str::to_string)
        .ok_or_else(|| "not a recognised image format".to_string())
}

pub(crate) fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

pub(crate) fn extension_for_media_type(media_type: &str) -> &'static str {
    let lowered = media_type.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}

#[cfg(test)]
mod tests {
    use std::fs;

    use base64::Engine as _;
    use lookbook_contracts::session::UploadedImage;

    use super::{extension_for_media_type, MediaEncoder, BASE64};

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0";

    #[test]
    fn encode_sniffs_media_type_from_content() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("mislabelled.png");
        fs::write(&path, JPEG_MAGIC)?;

        let payload = MediaEncoder::new().encode(&UploadedImage::from_path(&path))?;
        assert_eq!(payload.media_type, "image/jpeg");
        assert_eq!(BASE64.decode(payload.data.as_bytes())?, JPEG_MAGIC);
        Ok(())
    }

    #[test]
    fn declared_media_type_wins() -> anyhow::Result<()> {
        let image = UploadedImage::from_bytes(b"heic-ish".to_vec(), Some("image/HEIC".to_string()));
        let payload = MediaEncoder::new().encode(&image)?;
        assert_eq!(payload.media_type, "image/heic");
        Ok(())
    }

    #[test]
    fn encode_rejects_unreadable_and_unexpected_sources() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let encoder = MediaEncoder::new();

        let missing = encoder.encode(&UploadedImage::from_path(temp.path().join("nope.png")));
        assert!(missing.is_err_and(|err| err.message.starts_with("read failed")));

        let empty = encoder.encode(&UploadedImage::from_bytes(Vec::new(), None));
        assert!(empty.is_err_and(|err| err.message == "file is empty"));

        let text_path = temp.path().join("notes.txt");
        fs::write(&text_path, b"hello")?;
        let text = encoder.encode(&UploadedImage::from_path(&text_path));
        assert!(text.is_err_and(|err| err.label == "notes.txt"));

        let pdf = encoder.encode(&UploadedImage::from_bytes(
            b"%PDF".to_vec(),
            Some("application/pdf".to_string()),
        ));
        assert!(pdf.is_err_and(|err| err.message.contains("unsupported media type")));
        Ok(())
    }

    #[test]
    fn encode_all_preserves_length_and_order() -> anyhow::Result<()> {
        let encoder = MediaEncoder::new();
        for len in 1..=5usize {
            let images = (0..len)
                .map(|idx| {
                    let mut bytes = PNG_MAGIC.to_vec();
                    bytes.extend(vec![idx as u8; 64 * (len - idx)]);
                    UploadedImage::from_bytes(bytes, None)
                })
                .collect::<Vec<_>>();

            let payloads = encoder.encode_all(&images)?;
            assert_eq!(payloads.len(), len);
            for (idx, payload) in payloads.iter().enumerate() {
                let decoded = BASE64.decode(payload.data.as_bytes())?;
                assert_eq!(decoded.last().copied(), Some(idx as u8));
                assert_eq!(payload.media_type, "image/png");
            }
        }
        Ok(())
    }

    #[test]
    fn encode_all_reports_first_failure_in_input_order() {
        let images = vec![
            UploadedImage::from_bytes(PNG_MAGIC.to_vec(), None),
            UploadedImage::from_bytes(Vec::new(), None),
            UploadedImage::from_bytes(b"junk".to_vec(), None),
        ];
        let err = MediaEncoder::new().encode_all(&images).err();
        assert_eq!(err.map(|err| err.message), Some("file is empty".to_string()));
    }

    #[test]
    fn extension_follows_media_type() {
        assert_eq!(extension_for_media_type("image/jpeg"), "jpg");
        assert_eq!(extension_for_media_type("image/webp"), "webp");
        assert_eq!(extension_for_media_type("image/png"), "png");
        assert_eq!(extension_for_media_type("application/octet-stream"), "png");
    }
}
