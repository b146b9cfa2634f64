use std::path::Path;

use serde::Serialize;

use crate::comments::CommentTable;
use crate::descriptor::{DescriptorProto, ServiceDescriptorProto};
use crate::error::CatalogError;
use crate::index::DescriptorIndex;
use crate::resolve::{PathResolver, Strictness};
use crate::snapshot::{SchemaSnapshot, SnapshotFormat};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogOptions {
    pub format: SnapshotFormat,
    pub strictness: Strictness,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub digest: String,
    pub format: SnapshotFormat,
    pub files: usize,
    pub messages: usize,
    pub services: usize,
    pub comments: usize,
}

/// One snapshot together with the lookups built from it.
///
/// Built in one go and never mutated afterwards; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    snapshot: SchemaSnapshot,
    index: DescriptorIndex,
    comments: CommentTable,
}

impl Catalog {
    pub fn load(path: &Path, options: CatalogOptions) -> Result<Self, CatalogError> {
        let snapshot = SchemaSnapshot::read(path, options.format)?;
        Self::build(snapshot, options.strictness)
    }

    pub fn build(snapshot: SchemaSnapshot, strictness: Strictness) -> Result<Self, CatalogError> {
        let files = &snapshot.descriptor_set().file;
        let index = DescriptorIndex::build(files);
        let comments = CommentTable::build(files, &PathResolver::new(strictness))?;

        tracing::info!(
            digest = snapshot.digest(),
            format = %snapshot.format(),
            files = files.len(),
            messages = index.message_count(),
            services = index.service_count(),
            comments = comments.len(),
            "schema catalog built"
        );

        Ok(Self {
            snapshot,
            index,
            comments,
        })
    }

    pub fn get_message(&self, name: &str) -> Option<&DescriptorProto> {
        self.index.get_message(name)
    }

    pub fn get_service(&self, name: &str) -> Option<&ServiceDescriptorProto> {
        self.index.get_service(name)
    }

    /// Leading comment for `name`; empty when there is none.
    pub fn comment(&self, name: &str) -> &str {
        self.comments.get(name)
    }

    pub fn service_names(&self) -> Vec<String> {
        self.index.list_service_names()
    }

    pub fn snapshot(&self) -> &SchemaSnapshot {
        &self.snapshot
    }

    pub fn index(&self) -> &DescriptorIndex {
        &self.index
    }

    pub fn comments(&self) -> &CommentTable {
        &self.comments
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            digest: self.snapshot.digest().to_string(),
            format: self.snapshot.format(),
            files: self.snapshot.descriptor_set().file.len(),
            messages: self.index.message_count(),
            services: self.index.service_count(),
            comments: self.comments.len(),
        }
    }
}
