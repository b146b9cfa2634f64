//! Flattened fully-qualified name lookups over a descriptor set.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::descriptor::{DescriptorProto, FileDescriptorProto, ServiceDescriptorProto};

pub(crate) const SEPARATOR: char = '.';

/// What to look up in a [`DescriptorIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Message,
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Definition<'a> {
    Message(&'a DescriptorProto),
    Service(&'a ServiceDescriptorProto),
}

/// Message and service definitions keyed by fully-qualified name.
///
/// Nested messages are indexed under their parent (`pkg.Outer.Inner`).
/// Methods are not indexed; they live inside their service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorIndex {
    messages: BTreeMap<String, DescriptorProto>,
    services: BTreeMap<String, ServiceDescriptorProto>,
}

impl DescriptorIndex {
    pub fn build(files: &[FileDescriptorProto]) -> Self {
        let mut index = Self::default();
        for file in files {
            let package = file.package();
            for svc in &file.service {
                let fqn = qualify(package, svc.name());
                index.insert_service(fqn, svc);
            }
            for msg in &file.message_type {
                index.insert_message(qualify(package, msg.name()), msg);
            }
        }
        index
    }

    fn insert_message(&mut self, fqn: String, msg: &DescriptorProto) {
        for nested in &msg.nested_type {
            self.insert_message(qualify(&fqn, nested.name()), nested);
        }
        if self.messages.insert(fqn.clone(), msg.clone()).is_some() {
            tracing::warn!(name = %fqn, "duplicate message name; keeping the last definition");
        }
    }

    fn insert_service(&mut self, fqn: String, svc: &ServiceDescriptorProto) {
        if self.services.insert(fqn.clone(), svc.clone()).is_some() {
            tracing::warn!(name = %fqn, "duplicate service name; keeping the last definition");
        }
    }

    /// Look up a definition. Leading separators are ignored, so `.pkg.Msg`
    /// (the form used in `typeName` references) finds `pkg.Msg`.
    pub fn get(&self, kind: DefinitionKind, name: &str) -> Option<Definition<'_>> {
        match kind {
            DefinitionKind::Message => self.get_message(name).map(Definition::Message),
            DefinitionKind::Service => self.get_service(name).map(Definition::Service),
        }
    }

    pub fn get_message(&self, name: &str) -> Option<&DescriptorProto> {
        self.messages.get(lookup_key(name))
    }

    pub fn get_service(&self, name: &str) -> Option<&ServiceDescriptorProto> {
        self.services.get(lookup_key(name))
    }

    pub fn message_names(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Sorted service names, for catalog listings.
    pub fn list_service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}

/// `parent.name`, or just `name` when there is no parent (empty package).
pub(crate) fn qualify(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}

pub(crate) fn lookup_key(name: &str) -> &str {
    name.trim_start_matches(SEPARATOR)
}
