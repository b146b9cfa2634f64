//! Leading comments keyed by the fully-qualified name of the element they
//! document.

use std::collections::BTreeMap;

use crate::descriptor::FileDescriptorProto;
use crate::error::CatalogError;
use crate::index::lookup_key;
use crate::resolve::{ElementKind, PathResolver};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentTable {
    entries: BTreeMap<String, String>,
}

impl CommentTable {
    /// Resolve every location carrying a non-empty leading comment.
    ///
    /// When two locations resolve to the same name the one processed later
    /// (file order, then location order) wins.
    pub fn build(
        files: &[FileDescriptorProto],
        resolver: &PathResolver,
    ) -> Result<Self, CatalogError> {
        let mut entries = BTreeMap::new();

        for file in files {
            for loc in file.locations() {
                let Some(comment) = loc.leading_comment() else {
                    continue;
                };
                let resolved =
                    resolver
                        .resolve(file, &loc.path)
                        .map_err(|source| CatalogError::Resolve {
                            file: file.display_name().to_string(),
                            source,
                        })?;
                let key = resolved.qualified_name();

                if resolved.kind == ElementKind::Unsupported {
                    tracing::debug!(
                        file = file.display_name(),
                        path = ?loc.path,
                        key = %key,
                        "leading comment on unsupported location"
                    );
                } else {
                    tracing::debug!(kind = %resolved.kind, key = %key, "recorded leading comment");
                }

                if entries.insert(key.clone(), comment.to_string()).is_some() {
                    tracing::warn!(
                        file = file.display_name(),
                        key = %key,
                        "two locations resolve to the same name; keeping the later comment"
                    );
                }
            }
        }

        Ok(Self { entries })
    }

    /// Comment text for `name`, or `""` if none was recorded.
    pub fn get(&self, name: &str) -> &str {
        self.entries
            .get(lookup_key(name))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(lookup_key(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorProto, FieldDescriptorProto, Location, SourceCodeInfo};
    use crate::error::ResolveError;
    use crate::resolve::Strictness;

    fn loc(path: &[i32], comment: Option<&str>) -> Location {
        Location {
            path: path.to_vec(),
            leading_comments: comment.map(str::to_string),
            ..Default::default()
        }
    }

    fn ping_file(locations: Vec<Location>) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("demo.proto".to_string()),
            package: Some("demo".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Ping".to_string()),
                field: vec![FieldDescriptorProto {
                    name: Some("id".to_string()),
                    number: Some(1),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            source_code_info: Some(SourceCodeInfo { location: locations }),
            ..Default::default()
        }
    }

    #[test]
    fn records_comments_under_qualified_names() {
        let file = ping_file(vec![
            loc(&[4, 0], Some(" A ping.\n")),
            loc(&[4, 0, 2, 0], Some(" Correlation id.\n")),
            loc(&[12], None),
        ]);
        let table = CommentTable::build(&[file], &PathResolver::default()).expect("build");

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("demo.Ping"), " A ping.\n");
        assert_eq!(table.get("demo.Ping.id"), " Correlation id.\n");
        assert_eq!(table.get(".demo.Ping.id"), " Correlation id.\n");
    }

    #[test]
    fn absent_names_read_as_empty() {
        let file = ping_file(vec![loc(&[4, 0, 2, 0], None), loc(&[4, 0], Some(""))]);
        let table = CommentTable::build(&[file], &PathResolver::default()).expect("build");

        assert!(table.is_empty());
        assert_eq!(table.get("demo.Ping.id"), "");
        assert_eq!(table.get("nothing.here"), "");
        assert!(!table.contains("demo.Ping"));
    }

    #[test]
    fn unsupported_locations_use_fallback_keys_when_lenient() {
        let file = ping_file(vec![loc(&[5, 0], Some(" An enum.\n"))]);
        let table = CommentTable::build(&[file.clone()], &PathResolver::default()).expect("build");
        assert_eq!(table.get("demo.path:[5 0]"), " An enum.\n");

        let err = CommentTable::build(&[file], &PathResolver::new(Strictness::Strict))
            .expect_err("strict");
        assert!(matches!(
            err,
            CatalogError::Resolve {
                source: ResolveError::Unsupported { .. },
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_location_fails_the_build() {
        let file = ping_file(vec![loc(&[4, 0, 2, 3], Some(" stale\n"))]);
        let err = CommentTable::build(&[file], &PathResolver::default()).expect_err("stale path");
        match err {
            CatalogError::Resolve { file, source } => {
                assert_eq!(file, "demo.proto");
                assert!(matches!(source, ResolveError::IndexOutOfRange { index: 3, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn later_location_wins_on_collision() {
        let file = ping_file(vec![
            loc(&[4, 0], Some(" first\n")),
            loc(&[4, 0], Some(" second\n")),
        ]);
        let table = CommentTable::build(&[file], &PathResolver::default()).expect("build");
        assert_eq!(table.get("demo.Ping"), " second\n");
    }
}
