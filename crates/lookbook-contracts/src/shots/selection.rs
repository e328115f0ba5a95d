use indexmap::IndexSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Selected,
    Deselected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShotSelection {
    ids: IndexSet<String>,
}

impl ShotSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, id: &str) -> ToggleOutcome {
        if self.ids.shift_remove(id) {
            return ToggleOutcome::Deselected;
        }
        self.ids.insert(id.to_string());
        ToggleOutcome::Selected
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{ShotSelection, ToggleOutcome};

    #[test]
    fn toggle_keeps_insertion_order_without_duplicates() {
        let mut selection = ShotSelection::new();
        assert_eq!(selection.toggle("walking"), ToggleOutcome::Selected);
        assert_eq!(selection.toggle("front_full"), ToggleOutcome::Selected);
        assert_eq!(selection.toggle("back_view"), ToggleOutcome::Selected);
        assert_eq!(selection.toggle("front_full"), ToggleOutcome::Deselected);
        assert_eq!(selection.toggle("front_full"), ToggleOutcome::Selected);

        assert_eq!(
            selection.ids().collect::<Vec<_>>(),
            vec!["walking", "back_view", "front_full"]
        );
        assert_eq!(selection.len(), 3);
    }

    #[test]
    fn clear_empties_selection() {
        let mut selection = ShotSelection::new();
        selection.toggle("seated");
        selection.clear();
        assert!(selection.is_empty());
        assert!(!selection.contains("seated"));
    }
}
