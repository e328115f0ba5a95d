pub mod classify;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod media;
pub mod prompt;
pub mod response;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lookbook_contracts::events::EventWriter;
use lookbook_contracts::runs::receipts::{build_receipt, write_receipt, GenerationReceipt};
use lookbook_contracts::runs::summary::{write_summary, SessionSummary};
use lookbook_contracts::session::{
    CredentialState, GarmentCategory, SessionPhase, UploadedImage, Wardrobe,
};
use lookbook_contracts::shots::{ShotCatalog, ShotSelection, ToggleOutcome};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub use classify::ErrorClassifier;
pub use config::StudioConfig;
pub use credentials::{
    CredentialGate, CredentialProvider, EnvKeyProvider, NoProvider, StaticKeyProvider,
};
pub use dispatch::{GeminiTransport, GenerationRequest, GenerationTransport, RequestDispatcher};
pub use error::{DispatchError, EncodeError, ErrorClass, StudioError};
pub use media::{MediaEncoder, MediaPayload};
use media::extension_for_media_type;
pub use prompt::PromptComposer;
pub use response::{GeneratedMedia, ResponseExtractor};

const NO_SHOT_SELECTED: &str = "Select at least one shot.";

#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub generation_id: String,
    pub image_path: PathBuf,
    pub receipt_path: PathBuf,
    pub sha256: String,
    pub media: GeneratedMedia,
}

#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Generated(GeneratedArtifact),
    Empty,
}

pub struct StudioEngine {
    out_dir: PathBuf,
    session_id: String,
    events: EventWriter,
    config: StudioConfig,
    wardrobe: Wardrobe,
    selection: ShotSelection,
    composer: PromptComposer,
    encoder: MediaEncoder,
    gate: CredentialGate,
    dispatcher: RequestDispatcher,
    extractor: ResponseExtractor,
    classifier: ErrorClassifier,
    summary: SessionSummary,
    summary_path: PathBuf,
    in_flight: bool,
}

impl StudioEngine {
    pub fn new(
        out_dir: impl Into<PathBuf>,
        events_path: impl Into<PathBuf>,
        config: StudioConfig,
        provider: Box<dyn CredentialProvider>,
    ) -> Result<Self> {
        Self::with_transport(
            out_dir,
            events_path,
            config,
            provider,
            Box::new(GeminiTransport::new()),
        )
    }

    pub fn with_transport(
        out_dir: impl Into<PathBuf>,
        events_path: impl Into<PathBuf>,
        config: StudioConfig,
        provider: Box<dyn CredentialProvider>,
        transport: Box<dyn GenerationTransport>,
    ) -> Result<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        let session_id = Uuid::new_v4().to_string();
        let events = EventWriter::new(events_path.into(), session_id.clone());
        let summary_path = out_dir.join("summary.json");
        let summary = SessionSummary {
            session_id: session_id.clone(),
            started_at: now_utc_iso(),
            ..SessionSummary::default()
        };
        let gate = CredentialGate::new(provider, config.require_credential_check);
        let dispatcher = RequestDispatcher::new(&config, transport);

        events.emit(
            "session_started",
            map_object(json!({
                "out_dir": out_dir.to_string_lossy().to_string(),
                "model": config.model,
                "aspect_ratio": config.aspect_ratio,
                "image_size": config.image_size,
                "garment_policy": config.garment_policy,
                "credential_provider": gate.provider_name(),
            })),
        )?;

        Ok(Self {
            out_dir,
            session_id,
            events,
            config,
            wardrobe: Wardrobe::new(),
            selection: ShotSelection::new(),
            composer: PromptComposer::new(ShotCatalog::default()),
            encoder: MediaEncoder::new(),
            gate,
            dispatcher,
            extractor: ResponseExtractor::new(),
            classifier: ErrorClassifier::new(),
            summary,
            summary_path,
            in_flight: false,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ShotCatalog {
        self.composer.catalog()
    }

    pub fn wardrobe(&self) -> &Wardrobe {
        &self.wardrobe
    }

    pub fn selection(&self) -> &ShotSelection {
        &self.selection
    }

    pub fn credential_state(&self) -> CredentialState {
        self.gate.state()
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::derive(self.gate.state(), self.in_flight)
    }

    pub fn check_authorization(&mut self) -> Result<CredentialState> {
        let check = self.gate.check_authorization();
        self.events.emit(
            "credential_checked",
            map_object(json!({
                "provider": self.gate.provider_name(),
                "provider_available": check.source == credentials::CheckSource::Provider,
                "require_credential_check": self.config.require_credential_check,
                "credential_state": check.state,
            })),
        )?;
        Ok(check.state)
    }

    pub fn request_authorization(&mut self) -> Result<CredentialState> {
        self.events.emit(
            "credential_requested",
            map_object(json!({
                "provider": self.gate.provider_name(),
                "credential_state": self.gate.state(),
            })),
        )?;
        match self.gate.request_authorization() {
            Ok(state) => {
                self.events.emit(
                    "credential_checked",
                    map_object(json!({
                        "provider": self.gate.provider_name(),
                        "provider_available": true,
                        "credential_state": state,
                    })),
                )?;
                Ok(state)
            }
            Err(err) => {
                self.events.emit(
                    "credential_request_failed",
                    map_object(json!({
                        "provider": self.gate.provider_name(),
                        "error": format!("{err:#}"),
                        "credential_state": self.gate.state(),
                    })),
                )?;
                Ok(self.gate.state())
            }
        }
    }

    pub fn add_images(
        &mut self,
        category: GarmentCategory,
        images: Vec<UploadedImage>,
    ) -> Result<usize> {
        let offered = images.len();
        let accepted = self.wardrobe.add(category, images);
        self.emit_wardrobe("add", category, accepted, offered - accepted)?;
        Ok(accepted)
    }

    pub fn remove_image(
        &mut self,
        category: GarmentCategory,
        index: usize,
    ) -> Result<Option<UploadedImage>> {
        let removed = self.wardrobe.remove(category, index);
        if removed.is_some() {
            self.emit_wardrobe("remove", category, 0, 0)?;
        }
        Ok(removed)
    }

    pub fn clear_images(&mut self, category: GarmentCategory) -> Result<()> {
        self.wardrobe.clear(category);
        self.emit_wardrobe("clear", category, 0, 0)
    }

    pub fn set_accessory_text(&mut self, text: Option<String>) -> Result<()> {
        self.wardrobe.set_accessory_text(text);
        self.events.emit(
            "wardrobe_updated",
            map_object(json!({
                "action": "accessory_text",
                "category": GarmentCategory::Accessory,
                "accessory_text": self.wardrobe.accessory().description(),
            })),
        )?;
        Ok(())
    }

    pub fn toggle_shot(&mut self, id: &str) -> Result<ToggleOutcome, StudioError> {
        let id = id.trim();
        if !self.composer.catalog().contains(id) {
            return Err(StudioError::Validation(format!("Unknown shot '{id}'.")));
        }
        let outcome = self.selection.toggle(id);
        self.events.emit(
            "shots_updated",
            map_object(json!({
                "shot_id": id,
                "selected": outcome == ToggleOutcome::Selected,
                "shots": self.selected_shot_ids(),
            })),
        )?;
        Ok(outcome)
    }

    pub fn selected_shot_ids(&self) -> Vec<String> {
        self.composer
            .catalog()
            .resolve(&self.selection)
            .into_iter()
            .map(|shot| shot.id.clone())
            .collect()
    }

    pub fn generate(&mut self) -> Result<GenerationOutcome, StudioError> {
        let state = self.gate.state();
        if state != CredentialState::Authorized {
            self.summary.blocked += 1;
            self.events.emit(
                "generation_blocked",
                map_object(json!({
                    "reason": "locked",
                    "credential_state": state,
                })),
            )?;
            return Err(StudioError::Locked(state));
        }
        if let Err(message) = self.validate() {
            self.summary.blocked += 1;
            self.events.emit(
                "generation_blocked",
                map_object(json!({
                    "reason": "validation",
                    "message": message,
                })),
            )?;
            return Err(StudioError::Validation(message));
        }

        let generation_id = Uuid::new_v4().to_string();
        self.summary.attempts += 1;
        self.in_flight = true;
        let result = self.run_generation(&generation_id);
        self.in_flight = false;

        if let Err(err) = &result {
            self.summary.failures += 1;
            let class = match err {
                StudioError::Dispatch { class, .. } => Some(class.as_str()),
                _ => None,
            };
            self.events.emit(
                "generation_failed",
                map_object(json!({
                    "generation_id": generation_id,
                    "kind": err.kind(),
                    "class": class,
                    "error": err.to_string(),
                    "credential_state": self.gate.state(),
                })),
            )?;
        }
        result
    }

    pub fn finish(&mut self) -> Result<()> {
        self.summary.finished_at = now_utc_iso();
        let extra = map_object(json!({
            "model": self.config.model,
            "credential_state": self.gate.state(),
        }));
        write_summary(&self.summary_path, &self.summary, Some(&extra))?;
        self.events.emit(
            "session_finished",
            map_object(json!({
                "summary_path": self.summary_path.to_string_lossy().to_string(),
                "attempts": self.summary.attempts,
                "artifacts": self.summary.artifacts.len(),
            })),
        )?;
        Ok(())
    }

    fn validate(&self) -> Result<(), String> {
        let policy = self.config.garment_policy;
        if !policy.is_satisfied_by(&self.wardrobe) {
            return Err(policy.requirement_message().to_string());
        }
        if self.composer.catalog().resolve(&self.selection).is_empty() {
            return Err(NO_SHOT_SELECTED.to_string());
        }
        Ok(())
    }

    fn run_generation(&mut self, generation_id: &str) -> Result<GenerationOutcome, StudioError> {
        let request = self.build_request()?;
        let payload = self.dispatcher.build_payload(&request);
        self.events.emit(
            "generation_started",
            map_object(json!({
                "generation_id": generation_id,
                "phase": self.phase(),
                "model": self.config.model,
                "endpoint": self.dispatcher.endpoint(),
                "shots": self.selected_shot_ids(),
                "parts": request.part_counts(),
            })),
        )?;

        let api_key = self.gate.api_key();
        let response = match self.dispatcher.dispatch(&payload, api_key.as_deref()) {
            Ok(response) => response,
            Err(error) => {
                let class = self.classifier.classify(&error);
                if self.classifier.apply(class, &mut self.gate) {
                    self.events.emit(
                        "credential_revoked",
                        map_object(json!({
                            "generation_id": generation_id,
                            "reason": error.message,
                        })),
                    )?;
                }
                return Err(StudioError::Dispatch { class, error });
            }
        };

        let Some(media) = self.extractor.extract(&response) else {
            let reason = self.extractor.describe_empty(&response);
            self.summary.empty_results += 1;
            self.events.emit(
                "generation_empty",
                map_object(json!({
                    "generation_id": generation_id,
                    "candidates": reason.candidates,
                    "finish_reason": reason.finish_reason,
                    "text": reason.text,
                })),
            )?;
            return Ok(GenerationOutcome::Empty);
        };

        let artifact = self.write_artifact(generation_id, &request, &payload, &response, media)?;
        self.events.emit(
            "artifact_created",
            map_object(json!({
                "generation_id": generation_id,
                "image_path": artifact.image_path.to_string_lossy().to_string(),
                "receipt_path": artifact.receipt_path.to_string_lossy().to_string(),
                "media_type": artifact.media.media_type,
                "bytes": artifact.media.bytes.len(),
                "sha256": artifact.sha256,
            })),
        )?;
        Ok(GenerationOutcome::Generated(artifact))
    }

    fn build_request(&self) -> Result<GenerationRequest, StudioError> {
        let tops = self.encoder.encode_all(self.wardrobe.tops())?;
        let bottoms = self.encoder.encode_all(self.wardrobe.bottoms())?;
        let accessory = self
            .wardrobe
            .accessory()
            .image
            .as_ref()
            .map(|image| self.encoder.encode(image))
            .transpose()?;
        let instruction = self
            .composer
            .compose(&self.selection, self.wardrobe.accessory().description());
        Ok(GenerationRequest {
            instruction,
            tops,
            bottoms,
            accessory,
        })
    }

    fn write_artifact(
        &mut self,
        generation_id: &str,
        request: &GenerationRequest,
        payload: &Value,
        response: &Value,
        media: GeneratedMedia,
    ) -> Result<GeneratedArtifact> {
        let stamp = chrono::Utc::now().timestamp_millis();
        let ext = extension_for_media_type(&media.media_type);
        let short_id = generation_id.split('-').next().unwrap_or(generation_id);
        let image_path = self
            .out_dir
            .join(format!("artifact-{stamp}-{short_id}.{ext}"));
        fs::write(&image_path, &media.bytes)
            .with_context(|| format!("failed to write {}", image_path.display()))?;

        let sha256 = hex::encode(Sha256::digest(&media.bytes));
        let receipt_path = self.out_dir.join(format!("receipt-{generation_id}.json"));
        let receipt = GenerationReceipt {
            generation_id: generation_id.to_string(),
            session_id: self.session_id.clone(),
            model: self.config.model.clone(),
            aspect_ratio: self.config.aspect_ratio.clone(),
            image_size: self.config.image_size.clone(),
            shots: self.selected_shot_ids(),
            accessory_text: self
                .wardrobe
                .accessory()
                .description()
                .map(str::to_string),
            parts: request.part_counts(),
            instruction: request.instruction.clone(),
            media_type: media.media_type.clone(),
            sha256: sha256.clone(),
            created_at: now_utc_iso(),
        };
        let receipt_payload = build_receipt(
            &receipt,
            &map_object(payload.clone()),
            &map_object(response.clone()),
            &image_path,
            &receipt_path,
        );
        write_receipt(&receipt_path, &receipt_payload)
            .with_context(|| format!("failed to write {}", receipt_path.display()))?;

        self.summary
            .artifacts
            .push(image_path.to_string_lossy().to_string());
        Ok(GeneratedArtifact {
            generation_id: generation_id.to_string(),
            image_path,
            receipt_path,
            sha256,
            media,
        })
    }

    fn emit_wardrobe(
        &self,
        action: &str,
        category: GarmentCategory,
        accepted: usize,
        dropped: usize,
    ) -> Result<()> {
        self.events.emit(
            "wardrobe_updated",
            map_object(json!({
                "action": action,
                "category": category,
                "accepted": accepted,
                "dropped": dropped,
                "count": self.wardrobe.images(category).len(),
            })),
        )?;
        Ok(())
    }
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn now_utc_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}
