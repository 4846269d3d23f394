pub mod depth;
pub mod walk;

pub use depth::{validate, validate_tree, DepthReport, ValidatedTree};
pub use walk::{EntryKind, ExcludedEntry, RootSelection, TreeEntry, TreeSnapshot};
