use lookbook_contracts::shots::{ShotCatalog, ShotSelection};

const PREAMBLE: &str = "Generate a high-quality fashion model photo wearing the provided clothing items.
Strictly adhere to the following constraints:
- Use a vertical portrait orientation (9:16) to emphasize the clothing fit from the neck down.
- NO face, NO head, NO eyes, NO facial features.
- Focus on a 'Chin-down view'. Ensure the cut-off point is exactly at the lower jaw.
- All shots must be cropped at the model's jawline so the face does not appear. Maintain a professional fashion lookbook style.
";

#[derive(Debug, Clone, Default)]
pub struct PromptComposer {
    catalog: ShotCatalog,
}

impl PromptComposer {
    pub fn new(catalog: ShotCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ShotCatalog {
        &self.catalog
    }

    pub fn compose(&self, selection: &ShotSelection, accessory_text: Option<&str>) -> String {
        let mut prompt = PREAMBLE.to_string();

        let shot_lines = self
            .catalog
            .resolve(selection)
            .into_iter()
            .map(|shot| format!("- {}: {}", shot.name, shot.prompt))
            .collect::<Vec<_>>();
        if !shot_lines.is_empty() {
            prompt.push_str("\nRequested Shots/Poses:\n");
            prompt.push_str(&shot_lines.join("\n"));
        }

        if let Some(text) = accessory_text.map(str::trim).filter(|text| !text.is_empty()) {
            prompt.push_str(&format!("\nShoes/accessory description: {text}"));
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use lookbook_contracts::shots::{ShotCatalog, ShotSelection, ShotSpec};

    use super::{PromptComposer, PREAMBLE};

    fn composer() -> PromptComposer {
        let mut shots = IndexMap::new();
        for (id, name) in [("front", "Front"), ("side", "Side"), ("back", "Back")] {
            shots.insert(
                id.to_string(),
                ShotSpec {
                    id: id.to_string(),
                    name: name.to_string(),
                    prompt: format!("{name} framing."),
                },
            );
        }
        PromptComposer::new(ShotCatalog::new(Some(shots)))
    }

    fn selection(ids: &[&str]) -> ShotSelection {
        let mut selection = ShotSelection::new();
        for id in ids {
            selection.toggle(id);
        }
        selection
    }

    #[test]
    fn preamble_carries_framing_constraints() {
        let prompt = composer().compose(&ShotSelection::new(), None);
        assert_eq!(prompt, PREAMBLE);
        assert!(prompt.contains("9:16"));
        assert!(prompt.contains("NO face, NO head, NO eyes"));
        assert!(prompt.contains("lower jaw"));
        assert!(prompt.contains("lookbook"));
    }

    #[test]
    fn shots_follow_catalog_order_and_skip_unknown_ids() {
        let prompt = composer().compose(&selection(&["back", "ghost", "front"]), None);
        let expected = format!(
            "{PREAMBLE}\nRequested Shots/Poses:\n- Front: Front framing.\n- Back: Back framing."
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn accessory_line_only_for_non_empty_text() {
        let composer = composer();
        let shots = selection(&["side"]);
        let without = composer.compose(&shots, Some("   "));
        assert!(!without.contains("Shoes/accessory description"));

        let with = composer.compose(&shots, Some(" white leather sneakers "));
        assert!(with.ends_with(
            "\n- Side: Side framing.\nShoes/accessory description: white leather sneakers"
        ));
    }

    #[test]
    fn compose_is_deterministic() {
        let composer = composer();
        let shots = selection(&["side", "front"]);
        let first = composer.compose(&shots, Some("loafers"));
        for _ in 0..10 {
            assert_eq!(composer.compose(&shots, Some("loafers")), first);
        }
        assert_eq!(
            first,
            composer.compose(&selection(&["front", "side"]), Some("loafers"))
        );
    }
}
