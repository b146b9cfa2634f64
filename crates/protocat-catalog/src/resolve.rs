//! Structural location path → named schema element.
//!
//! `SourceCodeInfo.Location.path` identifies a node by the field numbers and
//! repeated-field indices walked from the `FileDescriptorProto` root, e.g.
//! `[4, 0, 2, 1]` = `message_type[0].field[1]`. The resolver replays that walk
//! against the file and reports the names it passed through plus the kind of
//! node it stopped at.
//!
//! Only the shapes the catalog serves are understood (messages, nested
//! messages, fields, services, methods). Anything else (enums, options,
//! `syntax`, ...) is either degraded to [`ElementKind::Unsupported`] with the
//! raw remainder attached, or rejected, depending on [`Strictness`].

use std::fmt;

use serde::Serialize;

use crate::descriptor::{DescriptorProto, FileDescriptorProto, ServiceDescriptorProto};
use crate::error::ResolveError;
use crate::index::SEPARATOR;

// Field numbers from descriptor.proto.
const FILE_MESSAGE_TYPE: i32 = 4;
const FILE_SERVICE: i32 = 6;
const MESSAGE_FIELD: i32 = 2;
const MESSAGE_NESTED_TYPE: i32 = 3;
const SERVICE_METHOD: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileStep {
    MessageType,
    Service,
    Unknown(i32),
}

impl From<i32> for FileStep {
    fn from(tag: i32) -> Self {
        match tag {
            FILE_MESSAGE_TYPE => Self::MessageType,
            FILE_SERVICE => Self::Service,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageStep {
    NestedType,
    Field,
    Unknown(i32),
}

impl From<i32> for MessageStep {
    fn from(tag: i32) -> Self {
        match tag {
            MESSAGE_NESTED_TYPE => Self::NestedType,
            MESSAGE_FIELD => Self::Field,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceStep {
    Method,
    Unknown(i32),
}

impl From<i32> for ServiceStep {
    fn from(tag: i32) -> Self {
        match tag {
            SERVICE_METHOD => Self::Method,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Empty path: the file itself, named by its package.
    Package,
    Message,
    Field,
    Service,
    Method,
    Unsupported,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Package => "package",
            Self::Message => "message",
            Self::Field => "field",
            Self::Service => "service",
            Self::Method => "method",
            Self::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// How to treat path shapes the resolver does not understand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Keep going: report [`ElementKind::Unsupported`] and carry the raw
    /// remainder as the last name component.
    #[default]
    Lenient,
    /// Fail with [`ResolveError::Unsupported`].
    Strict,
}

/// One step of a resolved name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum NameComponent {
    Name(String),
    /// Path remainder the resolver could not interpret.
    Unresolved(Vec<i32>),
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Unresolved(segment) => {
                f.write_str("path:[")?;
                for (i, n) in segment.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{n}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedPath {
    /// Root-to-leaf: package first, target element last.
    pub components: Vec<NameComponent>,
    pub kind: ElementKind,
}

impl ResolvedPath {
    /// Dot-joined name. An empty package contributes nothing.
    pub fn qualified_name(&self) -> String {
        let mut out = String::new();
        for (i, component) in self.components.iter().enumerate() {
            if i == 0 {
                if let NameComponent::Name(package) = component {
                    if package.is_empty() {
                        continue;
                    }
                }
            }
            if !out.is_empty() {
                out.push(SEPARATOR);
            }
            out.push_str(&component.to_string());
        }
        out
    }

    /// The raw remainder, when resolution degraded.
    pub fn unresolved(&self) -> Option<&[i32]> {
        match self.components.last() {
            Some(NameComponent::Unresolved(segment)) => Some(segment),
            _ => None,
        }
    }
}

/// Read position in a location path. Every index is checked against the
/// collection it addresses before use.
struct Cursor<'p> {
    path: &'p [i32],
    pos: usize,
}

impl<'p> Cursor<'p> {
    fn next_tag(&mut self) -> Option<i32> {
        let tag = *self.path.get(self.pos)?;
        self.pos += 1;
        Some(tag)
    }

    fn next_index(&mut self, len: usize) -> Result<usize, ResolveError> {
        let Some(&raw) = self.path.get(self.pos) else {
            return Err(ResolveError::MissingIndex {
                path: self.path.to_vec(),
                position: self.pos.saturating_sub(1),
            });
        };
        let index = usize::try_from(raw)
            .ok()
            .filter(|i| *i < len)
            .ok_or_else(|| ResolveError::IndexOutOfRange {
                path: self.path.to_vec(),
                position: self.pos,
                index: raw,
                len,
            })?;
        self.pos += 1;
        Ok(index)
    }

    /// Un-read the last tag and return everything from there on.
    fn remainder_from_last(&self) -> (usize, &'p [i32]) {
        let start = self.pos.saturating_sub(1);
        (start, &self.path[start..])
    }

    fn remainder(&self) -> (usize, &'p [i32]) {
        (self.pos, &self.path[self.pos..])
    }

    fn is_done(&self) -> bool {
        self.pos >= self.path.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathResolver {
    strictness: Strictness,
}

impl PathResolver {
    pub fn new(strictness: Strictness) -> Self {
        Self { strictness }
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Resolve `path` against `file`. Pure: same inputs, same output.
    pub fn resolve(
        &self,
        file: &FileDescriptorProto,
        path: &[i32],
    ) -> Result<ResolvedPath, ResolveError> {
        let mut cursor = Cursor { path, pos: 0 };
        let mut components = vec![NameComponent::Name(file.package().to_string())];

        let Some(tag) = cursor.next_tag() else {
            return Ok(ResolvedPath {
                components,
                kind: ElementKind::Package,
            });
        };

        let kind = match FileStep::from(tag) {
            FileStep::MessageType => {
                let i = cursor.next_index(file.message_type.len())?;
                self.message(&file.message_type[i], &mut cursor, &mut components)?
            }
            FileStep::Service => {
                let i = cursor.next_index(file.service.len())?;
                self.service(&file.service[i], &mut cursor, &mut components)?
            }
            FileStep::Unknown(_) => {
                let (at, rest) = cursor.remainder_from_last();
                self.unsupported(path, at, rest, &mut components)?
            }
        };

        Ok(ResolvedPath { components, kind })
    }

    fn message(
        &self,
        msg: &DescriptorProto,
        cursor: &mut Cursor<'_>,
        components: &mut Vec<NameComponent>,
    ) -> Result<ElementKind, ResolveError> {
        components.push(NameComponent::Name(msg.name().to_string()));

        let Some(tag) = cursor.next_tag() else {
            return Ok(ElementKind::Message);
        };

        match MessageStep::from(tag) {
            MessageStep::NestedType => {
                let i = cursor.next_index(msg.nested_type.len())?;
                self.message(&msg.nested_type[i], cursor, components)
            }
            MessageStep::Field => {
                let i = cursor.next_index(msg.field.len())?;
                components.push(NameComponent::Name(msg.field[i].name().to_string()));
                self.leaf(ElementKind::Field, cursor, components)
            }
            MessageStep::Unknown(_) => {
                let (at, rest) = cursor.remainder_from_last();
                self.unsupported(cursor.path, at, rest, components)
            }
        }
    }

    fn service(
        &self,
        svc: &ServiceDescriptorProto,
        cursor: &mut Cursor<'_>,
        components: &mut Vec<NameComponent>,
    ) -> Result<ElementKind, ResolveError> {
        components.push(NameComponent::Name(svc.name().to_string()));

        let Some(tag) = cursor.next_tag() else {
            return Ok(ElementKind::Service);
        };

        match ServiceStep::from(tag) {
            ServiceStep::Method => {
                let i = cursor.next_index(svc.method.len())?;
                components.push(NameComponent::Name(svc.method[i].name().to_string()));
                self.leaf(ElementKind::Method, cursor, components)
            }
            ServiceStep::Unknown(_) => {
                let (at, rest) = cursor.remainder_from_last();
                self.unsupported(cursor.path, at, rest, components)
            }
        }
    }

    /// Fields and methods are terminal; anything after them (options, ...)
    /// is not something we name.
    fn leaf(
        &self,
        kind: ElementKind,
        cursor: &mut Cursor<'_>,
        components: &mut Vec<NameComponent>,
    ) -> Result<ElementKind, ResolveError> {
        if cursor.is_done() {
            return Ok(kind);
        }
        let (at, rest) = cursor.remainder();
        self.unsupported(cursor.path, at, rest, components)
    }

    fn unsupported(
        &self,
        path: &[i32],
        position: usize,
        segment: &[i32],
        components: &mut Vec<NameComponent>,
    ) -> Result<ElementKind, ResolveError> {
        match self.strictness {
            Strictness::Strict => Err(ResolveError::Unsupported {
                path: path.to_vec(),
                position,
                segment: segment.to_vec(),
            }),
            Strictness::Lenient => {
                components.push(NameComponent::Unresolved(segment.to_vec()));
                Ok(ElementKind::Unsupported)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDescriptorProto, MethodDescriptorProto};

    fn named<T: Default>(f: impl FnOnce(&mut T)) -> T {
        let mut v = T::default();
        f(&mut v);
        v
    }

    fn field(name: &str) -> FieldDescriptorProto {
        named(|f: &mut FieldDescriptorProto| f.name = Some(name.to_string()))
    }

    fn demo_file() -> FileDescriptorProto {
        let inner = named(|m: &mut DescriptorProto| {
            m.name = Some("Inner".to_string());
            m.field = vec![field("payload")];
        });
        let ping = named(|m: &mut DescriptorProto| {
            m.name = Some("Ping".to_string());
            m.field = vec![field("id"), field("inner")];
            m.nested_type = vec![inner];
        });
        let echo = named(|s: &mut ServiceDescriptorProto| {
            s.name = Some("Echo".to_string());
            s.method = vec![named(|m: &mut MethodDescriptorProto| {
                m.name = Some("Send".to_string())
            })];
        });
        named(|f: &mut FileDescriptorProto| {
            f.name = Some("demo.proto".to_string());
            f.package = Some("demo".to_string());
            f.message_type = vec![ping];
            f.service = vec![echo];
        })
    }

    fn names(resolved: &ResolvedPath) -> Vec<String> {
        resolved.components.iter().map(|c| c.to_string()).collect()
    }

    fn lenient(path: &[i32]) -> Result<ResolvedPath, ResolveError> {
        PathResolver::default().resolve(&demo_file(), path)
    }

    #[test]
    fn resolves_top_level_message() {
        let r = lenient(&[4, 0]).expect("resolve");
        assert_eq!(names(&r), vec!["demo", "Ping"]);
        assert_eq!(r.kind, ElementKind::Message);
        assert_eq!(r.qualified_name(), "demo.Ping");
    }

    #[test]
    fn resolves_field() {
        let r = lenient(&[4, 0, 2, 0]).expect("resolve");
        assert_eq!(names(&r), vec!["demo", "Ping", "id"]);
        assert_eq!(r.kind, ElementKind::Field);
        assert_eq!(r.unresolved(), None);
    }

    #[test]
    fn resolves_nested_message_and_its_field() {
        let r = lenient(&[4, 0, 3, 0]).expect("nested");
        assert_eq!(names(&r), vec!["demo", "Ping", "Inner"]);
        assert_eq!(r.kind, ElementKind::Message);

        let r = lenient(&[4, 0, 3, 0, 2, 0]).expect("nested field");
        assert_eq!(r.qualified_name(), "demo.Ping.Inner.payload");
        assert_eq!(r.kind, ElementKind::Field);
    }

    #[test]
    fn resolves_service_and_method() {
        let r = lenient(&[6, 0]).expect("service");
        assert_eq!(names(&r), vec!["demo", "Echo"]);
        assert_eq!(r.kind, ElementKind::Service);

        let r = lenient(&[6, 0, 2, 0]).expect("method");
        assert_eq!(names(&r), vec!["demo", "Echo", "Send"]);
        assert_eq!(r.kind, ElementKind::Method);
    }

    #[test]
    fn empty_path_names_the_package() {
        let r = lenient(&[]).expect("file");
        assert_eq!(names(&r), vec!["demo"]);
        assert_eq!(r.kind, ElementKind::Package);
    }

    #[test]
    fn unknown_file_tag_degrades_with_whole_path() {
        let r = lenient(&[5, 0, 2, 1]).expect("enum value");
        assert_eq!(r.kind, ElementKind::Unsupported);
        assert_eq!(r.unresolved(), Some(&[5, 0, 2, 1][..]));
        assert_eq!(r.qualified_name(), "demo.path:[5 0 2 1]");
    }

    #[test]
    fn unknown_message_tag_degrades_with_remainder() {
        let r = lenient(&[4, 0, 4, 0]).expect("nested enum");
        assert_eq!(r.kind, ElementKind::Unsupported);
        assert_eq!(r.unresolved(), Some(&[4, 0][..]));
        assert_eq!(r.qualified_name(), "demo.Ping.path:[4 0]");
    }

    #[test]
    fn remainder_after_field_or_method_is_unsupported() {
        let r = lenient(&[4, 0, 2, 1, 8]).expect("field options");
        assert_eq!(r.kind, ElementKind::Unsupported);
        assert_eq!(names(&r), vec!["demo", "Ping", "inner", "path:[8]"]);

        let r = lenient(&[6, 0, 2, 0, 4]).expect("method options");
        assert_eq!(r.kind, ElementKind::Unsupported);
        assert_eq!(r.unresolved(), Some(&[4][..]));
    }

    #[test]
    fn strict_mode_rejects_unsupported_shapes() {
        let resolver = PathResolver::new(Strictness::Strict);
        let err = resolver
            .resolve(&demo_file(), &[4, 0, 7])
            .expect_err("message options");
        assert_eq!(
            err,
            ResolveError::Unsupported {
                path: vec![4, 0, 7],
                position: 2,
                segment: vec![7],
            }
        );

        // Supported shapes still resolve.
        assert!(resolver.resolve(&demo_file(), &[6, 0, 2, 0]).is_ok());
    }

    #[test]
    fn out_of_range_indices_are_errors() {
        let err = lenient(&[4, 1]).expect_err("no second message");
        assert_eq!(
            err,
            ResolveError::IndexOutOfRange {
                path: vec![4, 1],
                position: 1,
                index: 1,
                len: 1,
            }
        );

        assert!(matches!(
            lenient(&[4, 0, 2, 9]),
            Err(ResolveError::IndexOutOfRange { position: 3, len: 2, .. })
        ));
        assert!(matches!(
            lenient(&[6, 0, 2, 1]),
            Err(ResolveError::IndexOutOfRange { index: 1, len: 1, .. })
        ));
        assert!(matches!(
            lenient(&[4, -1]),
            Err(ResolveError::IndexOutOfRange { index: -1, .. })
        ));
    }

    #[test]
    fn missing_index_is_an_error() {
        assert_eq!(
            lenient(&[4]),
            Err(ResolveError::MissingIndex {
                path: vec![4],
                position: 0,
            })
        );
        assert!(matches!(
            lenient(&[4, 0, 3]),
            Err(ResolveError::MissingIndex { position: 2, .. })
        ));
    }

    #[test]
    fn empty_package_is_skipped_in_qualified_name() {
        let mut file = demo_file();
        file.package = None;
        let r = PathResolver::default()
            .resolve(&file, &[4, 0, 2, 0])
            .expect("resolve");
        assert_eq!(r.qualified_name(), "Ping.id");
    }

    #[test]
    fn resolution_is_deterministic() {
        let file = demo_file();
        let resolver = PathResolver::default();
        let paths: [&[i32]; 4] = [&[4, 0, 3, 0, 2, 0], &[6, 0, 2, 0], &[12], &[4, 2]];
        for path in paths {
            assert_eq!(resolver.resolve(&file, path), resolver.resolve(&file, path));
        }
    }
}
