//! Core domain models and logic for anon
//!
//! This crate contains:
//! - Domain models (Registration, Snapshot, TreeNode)
//! - Content classification (MIME types, text/binary sniffing)
//! - HTML views for rendered pages

pub mod classify;
pub mod error;
pub mod registration;
pub mod render;
pub mod snapshot;
pub mod tree;

pub use classify::{MimeType, classify};
pub use error::{Error, Result};
pub use registration::{Origin, RedactionOptions, Registration};
pub use render::{FileView, PageContext, RenderedPage};
pub use snapshot::Snapshot;
pub use tree::{CommitNode, DirectoryNode, EntryKind, FileNode, FlatEntry, TreeEntry, TreeNode};
