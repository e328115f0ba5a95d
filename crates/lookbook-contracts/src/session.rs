use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MAX_GARMENT_IMAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GarmentCategory {
    Top,
    Bottom,
    Accessory,
}

impl GarmentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GarmentCategory::Top => "top",
            GarmentCategory::Bottom => "bottom",
            GarmentCategory::Accessory => "accessory",
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            GarmentCategory::Top | GarmentCategory::Bottom => MAX_GARMENT_IMAGES,
            GarmentCategory::Accessory => 1,
        }
    }
}

impl fmt::Display for GarmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GarmentCategory {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "top" | "tops" => Ok(GarmentCategory::Top),
            "bottom" | "bottoms" => Ok(GarmentCategory::Bottom),
            "accessory" | "shoe" | "shoes" => Ok(GarmentCategory::Accessory),
            other => Err(format!(
                "Unknown garment category '{other}' (expected top, bottom or shoe)."
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub source: ImageSource,
    pub media_type: Option<String>,
    pub ordinal: usize,
}

impl UploadedImage {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ImageSource::Path(path.into()),
            media_type: None,
            ordinal: 0,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, media_type: Option<String>) -> Self {
        Self {
            source: ImageSource::Bytes(bytes),
            media_type: media_type
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            ordinal: 0,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            ImageSource::Path(path) => Some(path.as_path()),
            ImageSource::Bytes(_) => None,
        }
    }

    pub fn label(&self) -> String {
        match &self.source {
            ImageSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            ImageSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessoryDescriptor {
    pub image: Option<UploadedImage>,
    pub text: Option<String>,
}

impl AccessoryDescriptor {
    pub fn description(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wardrobe {
    tops: Vec<UploadedImage>,
    bottoms: Vec<UploadedImage>,
    accessory: AccessoryDescriptor,
}

impl Wardrobe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        category: GarmentCategory,
        images: impl IntoIterator<Item = UploadedImage>,
    ) -> usize {
        match category {
            GarmentCategory::Accessory => {
                let Some(mut image) = images.into_iter().next() else {
                    return 0;
                };
                image.ordinal = 0;
                self.accessory.image = Some(image);
                1
            }
            GarmentCategory::Top | GarmentCategory::Bottom => {
                let list = self.list_mut(category);
                let mut accepted = 0;
                for mut image in images {
                    if list.len() >= category.capacity() {
                        break;
                    }
                    image.ordinal = list.len();
                    list.push(image);
                    accepted += 1;
                }
                accepted
            }
        }
    }

    pub fn remove(&mut self, category: GarmentCategory, index: usize) -> Option<UploadedImage> {
        if category == GarmentCategory::Accessory {
            if index != 0 {
                return None;
            }
            return self.accessory.image.take();
        }
        let list = self.list_mut(category);
        if index >= list.len() {
            return None;
        }
        let removed = list.remove(index);
        for (ordinal, image) in list.iter_mut().enumerate() {
            image.ordinal = ordinal;
        }
        Some(removed)
    }

    pub fn clear(&mut self, category: GarmentCategory) {
        match category {
            GarmentCategory::Top => self.tops.clear(),
            GarmentCategory::Bottom => self.bottoms.clear(),
            GarmentCategory::Accessory => self.accessory.image = None,
        }
    }

    pub fn images(&self, category: GarmentCategory) -> &[UploadedImage] {
        match category {
            GarmentCategory::Top => &self.tops,
            GarmentCategory::Bottom => &self.bottoms,
            GarmentCategory::Accessory => self.accessory.image.as_slice(),
        }
    }

    pub fn tops(&self) -> &[UploadedImage] {
        &self.tops
    }

    pub fn bottoms(&self) -> &[UploadedImage] {
        &self.bottoms
    }

    pub fn accessory(&self) -> &AccessoryDescriptor {
        &self.accessory
    }

    pub fn set_accessory_text(&mut self, text: Option<String>) {
        self.accessory.text = text;
    }

    pub fn garment_count(&self) -> usize {
        self.tops.len() + self.bottoms.len()
    }

    fn list_mut(&mut self, category: GarmentCategory) -> &mut Vec<UploadedImage> {
        match category {
            GarmentCategory::Bottom => &mut self.bottoms,
            _ => &mut self.tops,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GarmentPolicy {
    #[default]
    AnyGarment,
    TopAndBottom,
}

impl GarmentPolicy {
    pub fn is_satisfied_by(&self, wardrobe: &Wardrobe) -> bool {
        match self {
            GarmentPolicy::AnyGarment => wardrobe.garment_count() > 0,
            GarmentPolicy::TopAndBottom => {
                !wardrobe.tops().is_empty() && !wardrobe.bottoms().is_empty()
            }
        }
    }

    pub fn requirement_message(&self) -> &'static str {
        match self {
            GarmentPolicy::AnyGarment => "Upload at least one top or bottom image.",
            GarmentPolicy::TopAndBottom => "Upload at least one top and one bottom image.",
        }
    }
}

impl FromStr for GarmentPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "any" | "any_garment" => Ok(GarmentPolicy::AnyGarment),
            "both" | "top_and_bottom" => Ok(GarmentPolicy::TopAndBottom),
            other => Err(format!(
                "Unknown garment policy '{other}' (expected any or both)."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Checking,
    Authorized,
    Unauthorized,
}

impl CredentialState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialState::Checking => "checking",
            CredentialState::Authorized => "authorized",
            CredentialState::Unauthorized => "unauthorized",
        }
    }

    pub fn can_transition_to(&self, next: CredentialState) -> bool {
        matches!(
            (self, next),
            (CredentialState::Checking, CredentialState::Authorized)
                | (CredentialState::Checking, CredentialState::Unauthorized)
                | (CredentialState::Unauthorized, CredentialState::Authorized)
                | (CredentialState::Authorized, CredentialState::Unauthorized)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    CheckingCredentials,
    Locked,
    Ready,
    Generating,
}

impl SessionPhase {
    pub fn derive(credential: CredentialState, in_flight: bool) -> Self {
        match credential {
            CredentialState::Checking => SessionPhase::CheckingCredentials,
            CredentialState::Unauthorized => SessionPhase::Locked,
            CredentialState::Authorized if in_flight => SessionPhase::Generating,
            CredentialState::Authorized => SessionPhase::Ready,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::CheckingCredentials => "checking_credentials",
            SessionPhase::Locked => "locked",
            SessionPhase::Ready => "ready",
            SessionPhase::Generating => "generating",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: &str) -> UploadedImage {
        UploadedImage::from_path(format!("/tmp/{tag}.png"))
    }

    #[test]
    fn add_truncates_at_capacity_and_numbers_ordinals() {
        let mut wardrobe = Wardrobe::new();
        let accepted = wardrobe.add(
            GarmentCategory::Top,
            (0..7).map(|idx| image(&format!("top-{idx}"))),
        );
        assert_eq!(accepted, MAX_GARMENT_IMAGES);
        assert_eq!(wardrobe.tops().len(), MAX_GARMENT_IMAGES);
        assert_eq!(
            wardrobe.tops().iter().map(|img| img.ordinal).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert_eq!(wardrobe.add(GarmentCategory::Top, [image("extra")]), 0);
    }

    #[test]
    fn remove_renumbers_remaining_images() {
        let mut wardrobe = Wardrobe::new();
        wardrobe.add(
            GarmentCategory::Bottom,
            [image("a"), image("b"), image("c")],
        );
        let removed = wardrobe.remove(GarmentCategory::Bottom, 1);
        assert_eq!(removed.map(|img| img.label()), Some("b.png".to_string()));
        assert_eq!(
            wardrobe
                .bottoms()
                .iter()
                .map(|img| (img.label(), img.ordinal))
                .collect::<Vec<_>>(),
            vec![("a.png".to_string(), 0), ("c.png".to_string(), 1)]
        );
        assert!(wardrobe.remove(GarmentCategory::Bottom, 9).is_none());
    }

    #[test]
    fn accessory_slot_is_replaced_not_appended() {
        let mut wardrobe = Wardrobe::new();
        assert_eq!(wardrobe.add(GarmentCategory::Accessory, [image("shoe-a")]), 1);
        assert_eq!(
            wardrobe.add(GarmentCategory::Accessory, [image("shoe-b"), image("shoe-c")]),
            1
        );
        let slot = wardrobe.images(GarmentCategory::Accessory);
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0].label(), "shoe-b.png");
        assert_eq!(wardrobe.garment_count(), 0);
    }

    #[test]
    fn accessory_description_ignores_blank_text() {
        let mut wardrobe = Wardrobe::new();
        wardrobe.set_accessory_text(Some("   ".to_string()));
        assert_eq!(wardrobe.accessory().description(), None);
        wardrobe.set_accessory_text(Some(" white sneakers ".to_string()));
        assert_eq!(wardrobe.accessory().description(), Some("white sneakers"));
    }

    #[test]
    fn garment_policy_checks_categories() {
        let mut wardrobe = Wardrobe::new();
        assert!(!GarmentPolicy::AnyGarment.is_satisfied_by(&wardrobe));

        wardrobe.add(GarmentCategory::Top, [image("a"), image("b")]);
        assert!(GarmentPolicy::AnyGarment.is_satisfied_by(&wardrobe));
        assert!(!GarmentPolicy::TopAndBottom.is_satisfied_by(&wardrobe));

        wardrobe.add(GarmentCategory::Bottom, [image("c")]);
        assert!(GarmentPolicy::TopAndBottom.is_satisfied_by(&wardrobe));
        assert_eq!("both".parse::<GarmentPolicy>(), Ok(GarmentPolicy::TopAndBottom));
        assert!("sometimes".parse::<GarmentPolicy>().is_err());
    }

    #[test]
    fn credential_transitions_follow_state_machine() {
        use CredentialState::*;
        assert!(Checking.can_transition_to(Authorized));
        assert!(Checking.can_transition_to(Unauthorized));
        assert!(Unauthorized.can_transition_to(Authorized));
        assert!(Authorized.can_transition_to(Unauthorized));
        assert!(!Authorized.can_transition_to(Checking));
        assert!(!Unauthorized.can_transition_to(Checking));
        assert!(!Authorized.can_transition_to(Authorized));
    }

    #[test]
    fn session_phase_never_generates_while_locked() {
        assert_eq!(
            SessionPhase::derive(CredentialState::Unauthorized, true),
            SessionPhase::Locked
        );
        assert_eq!(
            SessionPhase::derive(CredentialState::Checking, true),
            SessionPhase::CheckingCredentials
        );
        assert_eq!(
            SessionPhase::derive(CredentialState::Authorized, true),
            SessionPhase::Generating
        );
        assert_eq!(
            SessionPhase::derive(CredentialState::Authorized, false),
            SessionPhase::Ready
        );
    }

    #[test]
    fn category_parsing_accepts_aliases() {
        assert_eq!("Tops".parse::<GarmentCategory>(), Ok(GarmentCategory::Top));
        assert_eq!("shoe".parse::<GarmentCategory>(), Ok(GarmentCategory::Accessory));
        assert!("hat".parse::<GarmentCategory>().is_err());
    }
}
