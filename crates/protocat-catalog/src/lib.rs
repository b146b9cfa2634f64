//! Read-only catalog over a compiled protobuf schema.
//!
//! Pipeline (run once per process):
//! 1. Load a `FileDescriptorSet` snapshot (binary or JSON) → [`SchemaSnapshot`]
//! 2. Flatten messages/services into fully-qualified lookups → [`DescriptorIndex`]
//! 3. Resolve every commented source location to the element it documents →
//!    [`CommentTable`] (via [`PathResolver`])
//!
//! The result is a [`Catalog`]: immutable, safe to share across threads.

pub mod catalog;
pub mod comments;
pub mod descriptor;
pub mod error;
pub mod index;
pub mod resolve;
pub mod snapshot;

pub use catalog::{Catalog, CatalogOptions, CatalogStats};
pub use comments::CommentTable;
pub use error::{CatalogError, ResolveError};
pub use index::{Definition, DefinitionKind, DescriptorIndex};
pub use resolve::{ElementKind, NameComponent, PathResolver, ResolvedPath, Strictness};
pub use snapshot::{SchemaSnapshot, SnapshotFormat};
