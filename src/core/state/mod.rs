//! Dataset state: directory layout and changeset cursor

pub mod cursor;
pub mod layout;

pub use cursor::{ChangesetWindow, CursorTracker};
pub use layout::DatasetPaths;
