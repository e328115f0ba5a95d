mod catalog;
mod selection;

pub use catalog::{ShotCatalog, ShotSpec};
pub use selection::{ShotSelection, ToggleOutcome};
