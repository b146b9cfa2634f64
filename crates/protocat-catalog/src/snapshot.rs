//! Schema snapshot loading.
//!
//! A snapshot is read exactly once, at startup. Both the binary
//! `FileDescriptorSet` (`protoc --descriptor_set_out`, `buf build -o x.pb`) and
//! its JSON rendering are accepted.

use std::fmt;
use std::path::Path;

use prost::Message as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::descriptor::FileDescriptorSet;
use crate::error::CatalogError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// Sniff the content: JSON if it starts with `{`, binary otherwise.
    ///
    /// A binary set starts with `0x0a` (field 1, length-delimited), which is
    /// also `\n`. Input with that first byte is decoded as binary when it
    /// decodes cleanly and only then sniffed for JSON.
    #[default]
    Auto,
    Binary,
    Json,
}

/// Tag byte of `FileDescriptorSet.file` (field 1, wire type 2).
const FILE_TAG: u8 = 0x0a;

impl SnapshotFormat {
    fn looks_like_json(bytes: &[u8]) -> bool {
        bytes.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{')
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Binary => "binary",
            Self::Json => "json",
        };
        f.write_str(s)
    }
}

/// The decoded descriptor set plus what we know about where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSnapshot {
    set: FileDescriptorSet,
    digest: String,
    format: SnapshotFormat,
}

impl SchemaSnapshot {
    pub fn read(path: &Path, format: SnapshotFormat) -> Result<Self, CatalogError> {
        let bytes = std::fs::read(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, format)
    }

    pub fn from_bytes(bytes: &[u8], format: SnapshotFormat) -> Result<Self, CatalogError> {
        let (set, format) = match format {
            SnapshotFormat::Binary => (FileDescriptorSet::decode(bytes)?, SnapshotFormat::Binary),
            SnapshotFormat::Json => (serde_json::from_slice(bytes)?, SnapshotFormat::Json),
            SnapshotFormat::Auto => decode_auto(bytes)?,
        };
        Ok(Self {
            set,
            digest: sha256_hex(bytes),
            format,
        })
    }

    /// Wrap an in-memory set (tests, embedding). The digest covers the
    /// canonical binary encoding.
    pub fn from_set(set: FileDescriptorSet) -> Self {
        let digest = sha256_hex(&set.encode_to_vec());
        Self {
            set,
            digest,
            format: SnapshotFormat::Binary,
        }
    }

    pub fn descriptor_set(&self) -> &FileDescriptorSet {
        &self.set
    }

    /// SHA-256 of the bytes the snapshot was decoded from, lowercase hex.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The format actually used to decode (never `Auto`).
    pub fn format(&self) -> SnapshotFormat {
        self.format
    }
}

fn decode_auto(bytes: &[u8]) -> Result<(FileDescriptorSet, SnapshotFormat), CatalogError> {
    if bytes.first() == Some(&FILE_TAG) {
        match FileDescriptorSet::decode(bytes) {
            Ok(set) => return Ok((set, SnapshotFormat::Binary)),
            Err(e) if !SnapshotFormat::looks_like_json(bytes) => return Err(e.into()),
            Err(_) => {}
        }
    }
    if SnapshotFormat::looks_like_json(bytes) {
        Ok((serde_json::from_slice(bytes)?, SnapshotFormat::Json))
    } else {
        Ok((FileDescriptorSet::decode(bytes)?, SnapshotFormat::Binary))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorProto, FileDescriptorProto};

    fn demo_set() -> FileDescriptorSet {
        FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("demo.proto".to_string()),
                package: Some("demo".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("Ping".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn auto_detects_binary_and_json() {
        let set = demo_set();

        let binary = SchemaSnapshot::from_bytes(&set.encode_to_vec(), SnapshotFormat::Auto)
            .expect("binary");
        assert_eq!(binary.format(), SnapshotFormat::Binary);
        assert_eq!(binary.descriptor_set(), &set);

        let text = format!("\n  {}", serde_json::to_string(&set).expect("json"));
        let json = SchemaSnapshot::from_bytes(text.as_bytes(), SnapshotFormat::Auto).expect("json");
        assert_eq!(json.format(), SnapshotFormat::Json);
        assert_eq!(json.descriptor_set(), &set);
    }

    #[test]
    fn auto_keeps_binary_whose_length_byte_is_a_brace() {
        // name: tag + length + 121 bytes, so the file encodes to 123 (`{`)
        // and the set starts with `\n{`.
        let file = FileDescriptorProto {
            name: Some("x".repeat(121)),
            ..Default::default()
        };
        assert_eq!(file.encoded_len(), 123);

        let set = FileDescriptorSet { file: vec![file] };
        let bytes = set.encode_to_vec();
        assert_eq!(&bytes[..2], b"\n{");

        let snapshot = SchemaSnapshot::from_bytes(&bytes, SnapshotFormat::Auto).expect("binary");
        assert_eq!(snapshot.format(), SnapshotFormat::Binary);
        assert_eq!(snapshot.descriptor_set(), &set);
    }

    #[test]
    fn digest_depends_on_bytes_only() {
        let bytes = demo_set().encode_to_vec();
        let a = SchemaSnapshot::from_bytes(&bytes, SnapshotFormat::Binary).expect("a");
        let b = SchemaSnapshot::from_bytes(&bytes, SnapshotFormat::Auto).expect("b");
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        assert_eq!(SchemaSnapshot::from_set(demo_set()).digest(), a.digest());
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = SchemaSnapshot::from_bytes(&[0x0a, 0xff], SnapshotFormat::Binary)
            .expect_err("truncated message");
        assert!(matches!(err, CatalogError::Decode(_)));

        let err = SchemaSnapshot::from_bytes(b"{ not json", SnapshotFormat::Auto)
            .expect_err("bad json");
        assert!(matches!(err, CatalogError::Json(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SchemaSnapshot::read(Path::new("/definitely/not/here.pb"), SnapshotFormat::Auto)
            .expect_err("missing file");
        match err {
            CatalogError::Io { path, .. } => assert!(path.ends_with("here.pb")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
