use indexmap::IndexMap;

use super::selection::ShotSelection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotSpec {
    pub id: String,
    pub name: String,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct ShotCatalog {
    shots: IndexMap<String, ShotSpec>,
}

impl Default for ShotCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ShotCatalog {
    pub fn new(shots: Option<IndexMap<String, ShotSpec>>) -> Self {
        Self {
            shots: shots.unwrap_or_else(default_shots),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ShotSpec> {
        self.shots.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.shots.contains_key(id)
    }

    pub fn list(&self) -> impl Iterator<Item = &ShotSpec> {
        self.shots.values()
    }

    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    /// Selected shots in catalog order. Ids the catalog does not know are skipped.
    pub fn resolve(&self, selection: &ShotSelection) -> Vec<&ShotSpec> {
        self.shots
            .values()
            .filter(|shot| selection.contains(&shot.id))
            .collect()
    }
}

fn default_shots() -> IndexMap<String, ShotSpec> {
    let mut map = IndexMap::new();

    let mut insert = |id: &str, name: &str, prompt: &str| {
        map.insert(
            id.to_string(),
            ShotSpec {
                id: id.to_string(),
                name: name.to_string(),
                prompt: prompt.to_string(),
            },
        );
    };

    insert(
        "front_full",
        "Front full body",
        "Straight-on full-length view from the jawline to the shoes, arms relaxed at the sides, weight evenly balanced.",
    );
    insert(
        "front_half",
        "Front half body",
        "Straight-on view from the jawline to mid-thigh so the top's fit, neckline and hem read clearly.",
    );
    insert(
        "side_profile",
        "Side profile",
        "Full-length 90-degree side view showing the garment silhouette, drape and trouser break.",
    );
    insert(
        "back_view",
        "Back view",
        "Full-length view from behind, shoulders square to the camera, showing back seams and rear pockets.",
    );
    insert(
        "walking",
        "Walking pose",
        "Mid-stride walking pose toward the camera with natural arm swing and visible fabric movement.",
    );
    insert(
        "hand_in_pocket",
        "Hand in pocket",
        "Relaxed three-quarter stance with one hand in a pocket, slight hip shift, casual lookbook attitude.",
    );
    insert(
        "seated",
        "Seated pose",
        "Seated on a plain studio stool, legs slightly apart, showing how the garments fold and crease when sitting.",
    );
    insert(
        "top_detail",
        "Top detail close-up",
        "Close-up of the chest and shoulder area highlighting fabric texture, stitching and print details.",
    );
    insert(
        "bottom_detail",
        "Bottom detail close-up",
        "Close-up from the waist to the knees highlighting waistband, pockets and fabric texture.",
    );

    map
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{ShotCatalog, ShotSpec};
    use crate::shots::ShotSelection;

    fn spec(id: &str) -> ShotSpec {
        ShotSpec {
            id: id.to_string(),
            name: id.to_uppercase(),
            prompt: format!("{id} prompt"),
        }
    }

    #[test]
    fn default_catalog_has_unique_non_empty_entries() {
        let catalog = ShotCatalog::default();
        assert!(!catalog.is_empty());
        for shot in catalog.list() {
            assert!(!shot.name.trim().is_empty(), "{} has no name", shot.id);
            assert!(!shot.prompt.trim().is_empty(), "{} has no prompt", shot.id);
            assert_eq!(catalog.get(&shot.id), Some(shot));
        }
    }

    #[test]
    fn resolve_uses_catalog_order_not_click_order() {
        let mut shots = IndexMap::new();
        for id in ["a", "b", "c"] {
            shots.insert(id.to_string(), spec(id));
        }
        let catalog = ShotCatalog::new(Some(shots));

        let mut selection = ShotSelection::new();
        selection.toggle("c");
        selection.toggle("a");

        let resolved = catalog
            .resolve(&selection)
            .into_iter()
            .map(|shot| shot.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(resolved, vec!["a", "c"]);
    }

    #[test]
    fn resolve_skips_unknown_ids() {
        let mut shots = IndexMap::new();
        shots.insert("a".to_string(), spec("a"));
        let catalog = ShotCatalog::new(Some(shots));

        let mut selection = ShotSelection::new();
        selection.toggle("ghost");
        selection.toggle("a");

        assert_eq!(catalog.resolve(&selection), vec![&spec("a")]);
    }
}
