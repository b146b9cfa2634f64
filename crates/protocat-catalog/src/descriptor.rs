//! Compiled schema description (`google.protobuf.FileDescriptorSet`, subset).
//!
//! The structs below mirror `descriptor.proto` closely enough to decode the
//! binary snapshot emitted by `protoc --descriptor_set_out` (field numbers are
//! the upstream ones) and to read/write the protobuf JSON mapping emitted by
//! `buf build --as-file-descriptor-set -o descriptor.json`.
//!
//! Only what the catalog serves is modeled: names, structure, the options a
//! client needs to render a message (map entries, packed and deprecated
//! flags), reserved ranges and extensions. Everything else (custom options,
//! editions features) is skipped on decode: prost ignores unknown tags, serde
//! ignores unknown keys.
//!
//! String getters (`name()`, `package()`, ...) come from the prost derive and
//! read as `""` when the field is unset.

use serde::{Deserialize, Serialize};

// =============================================================================
// Files
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDescriptorSet {
    #[prost(message, repeated, tag = "1")]
    pub file: Vec<FileDescriptorProto>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileDescriptorProto {
    #[prost(string, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[prost(string, repeated, tag = "3")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependency: Vec<String>,
    #[prost(int32, repeated, packed = "false", tag = "10")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub public_dependency: Vec<i32>,
    #[prost(message, repeated, tag = "4")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub message_type: Vec<DescriptorProto>,
    #[prost(message, repeated, tag = "5")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_type: Vec<EnumDescriptorProto>,
    #[prost(message, repeated, tag = "6")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<ServiceDescriptorProto>,
    #[prost(message, repeated, tag = "7")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<FieldDescriptorProto>,
    #[prost(message, optional, tag = "8")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<FileOptions>,
    #[prost(message, optional, tag = "9")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_code_info: Option<SourceCodeInfo>,
    #[prost(string, optional, tag = "12")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax: Option<String>,
}

impl FileDescriptorProto {
    /// File name for diagnostics; `<unknown>` when the compiler left it unset.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unknown>")
    }

    /// Source locations recorded by the compiler (empty when the snapshot was
    /// built without source info).
    pub fn locations(&self) -> &[Location] {
        self.source_code_info
            .as_ref()
            .map(|sci| sci.location.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileOptions {
    #[prost(string, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_package: Option<String>,
    #[prost(string, optional, tag = "8")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_outer_classname: Option<String>,
    #[prost(bool, optional, tag = "10")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_multiple_files: Option<bool>,
    #[prost(string, optional, tag = "11")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_package: Option<String>,
    #[prost(bool, optional, tag = "23")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[prost(string, optional, tag = "37")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csharp_namespace: Option<String>,
}

// =============================================================================
// Messages
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DescriptorProto {
    #[prost(string, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field: Vec<FieldDescriptorProto>,
    #[prost(message, repeated, tag = "6")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<FieldDescriptorProto>,
    #[prost(message, repeated, tag = "3")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested_type: Vec<DescriptorProto>,
    #[prost(message, repeated, tag = "4")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_type: Vec<EnumDescriptorProto>,
    #[prost(message, repeated, tag = "5")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extension_range: Vec<ExtensionRange>,
    #[prost(message, repeated, tag = "8")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub oneof_decl: Vec<OneofDescriptorProto>,
    #[prost(message, optional, tag = "7")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<MessageOptions>,
    #[prost(message, repeated, tag = "9")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reserved_range: Vec<ReservedRange>,
    #[prost(string, repeated, tag = "10")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reserved_name: Vec<String>,
}

impl DescriptorProto {
    /// Synthesized `FooEntry` type backing a `map<K, V>` field.
    pub fn is_map_entry(&self) -> bool {
        self.options.as_ref().and_then(|o| o.map_entry).unwrap_or(false)
    }
}

/// `DescriptorProto.ExtensionRange`: `start` inclusive, `end` exclusive.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionRange {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i32>,
}

/// `DescriptorProto.ReservedRange`: `start` inclusive, `end` exclusive.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservedRange {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageOptions {
    #[prost(bool, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_set_wire_format: Option<bool>,
    #[prost(bool, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[prost(bool, optional, tag = "7")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_entry: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldDescriptorProto {
    #[prost(string, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[prost(int32, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none", with = "json_enum::label")]
    pub label: Option<i32>,
    #[prost(int32, optional, tag = "5")]
    #[serde(
        rename = "type",
        skip_serializing_if = "Option::is_none",
        with = "json_enum::field_type"
    )]
    pub r#type: Option<i32>,
    #[prost(string, optional, tag = "6")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[prost(string, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extendee: Option<String>,
    #[prost(string, optional, tag = "7")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[prost(int32, optional, tag = "9")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oneof_index: Option<i32>,
    #[prost(string, optional, tag = "10")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_name: Option<String>,
    #[prost(message, optional, tag = "8")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<FieldOptions>,
    #[prost(bool, optional, tag = "17")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proto3_optional: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldOptions {
    #[prost(bool, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packed: Option<bool>,
    #[prost(bool, optional, tag = "5")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lazy: Option<bool>,
    #[prost(bool, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct OneofDescriptorProto {
    #[prost(string, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnumDescriptorProto {
    #[prost(string, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<EnumValueDescriptorProto>,
    #[prost(message, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<EnumOptions>,
    #[prost(message, repeated, tag = "4")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reserved_range: Vec<EnumReservedRange>,
    #[prost(string, repeated, tag = "5")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reserved_name: Vec<String>,
}

/// `EnumDescriptorProto.EnumReservedRange`: both ends inclusive.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumReservedRange {
    #[prost(int32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnumOptions {
    #[prost(bool, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_alias: Option<bool>,
    #[prost(bool, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumValueDescriptorProto {
    #[prost(string, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[prost(int32, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<i32>,
    #[prost(message, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<DeprecationOptions>,
}

// =============================================================================
// Services
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDescriptorProto {
    #[prost(string, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub method: Vec<MethodDescriptorProto>,
    #[prost(message, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ServiceOptions>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MethodDescriptorProto {
    #[prost(string, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[prost(string, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
    #[prost(message, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<MethodOptions>,
    #[prost(bool, optional, tag = "5")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_streaming: Option<bool>,
    #[prost(bool, optional, tag = "6")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_streaming: Option<bool>,
}

/// `EnumValueOptions`: only `deprecated` (tag 1) is modeled.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct DeprecationOptions {
    #[prost(bool, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
}

// `ServiceOptions` and `MethodOptions` put `deprecated` at tag 33.

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    #[prost(bool, optional, tag = "33")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodOptions {
    #[prost(bool, optional, tag = "33")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
}

// =============================================================================
// Source info
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceCodeInfo {
    #[prost(message, repeated, tag = "1")]
    pub location: Vec<Location>,
}

/// One annotated node: a structural path from the file root plus the comments
/// the compiler attached to it.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    #[prost(int32, repeated, tag = "1")]
    pub path: Vec<i32>,
    #[prost(int32, repeated, tag = "2")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub span: Vec<i32>,
    #[prost(string, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leading_comments: Option<String>,
    #[prost(string, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_comments: Option<String>,
    #[prost(string, repeated, tag = "6")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub leading_detached_comments: Vec<String>,
}

impl Location {
    /// Leading comment, if the compiler recorded a non-empty one.
    pub fn leading_comment(&self) -> Option<&str> {
        self.leading_comments.as_deref().filter(|c| !c.is_empty())
    }
}

// =============================================================================
// JSON enum mapping
// =============================================================================

/// Protobuf JSON renders enums by name and accepts either the name or the
/// number on input. The descriptor keeps them as raw `i32` so the binary form
/// stays opaque to everything but this module.
mod json_enum {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(i32),
        Name(String),
    }

    fn serialize<S: Serializer>(
        names: &[(i32, &str)],
        value: &Option<i32>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let Some(v) = value else {
            return serializer.serialize_none();
        };
        match names.iter().find(|(n, _)| n == v) {
            Some((_, name)) => serializer.serialize_str(name),
            None => serializer.serialize_i32(*v),
        }
    }

    fn deserialize<'de, D: Deserializer<'de>>(
        names: &[(i32, &str)],
        deserializer: D,
    ) -> Result<Option<i32>, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(n)) => Ok(Some(n)),
            Some(Repr::Name(name)) => names
                .iter()
                .find(|(_, candidate)| *candidate == name)
                .map(|(n, _)| Some(*n))
                .ok_or_else(|| serde::de::Error::custom(format!("unknown enum value `{name}`"))),
        }
    }

    pub mod label {
        use serde::{Deserializer, Serializer};

        const NAMES: &[(i32, &str)] = &[
            (1, "LABEL_OPTIONAL"),
            (2, "LABEL_REQUIRED"),
            (3, "LABEL_REPEATED"),
        ];

        pub fn serialize<S: Serializer>(value: &Option<i32>, s: S) -> Result<S::Ok, S::Error> {
            super::serialize(NAMES, value, s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
            super::deserialize(NAMES, d)
        }
    }

    pub mod field_type {
        use serde::{Deserializer, Serializer};

        const NAMES: &[(i32, &str)] = &[
            (1, "TYPE_DOUBLE"),
            (2, "TYPE_FLOAT"),
            (3, "TYPE_INT64"),
            (4, "TYPE_UINT64"),
            (5, "TYPE_INT32"),
            (6, "TYPE_FIXED64"),
            (7, "TYPE_FIXED32"),
            (8, "TYPE_BOOL"),
            (9, "TYPE_STRING"),
            (10, "TYPE_GROUP"),
            (11, "TYPE_MESSAGE"),
            (12, "TYPE_BYTES"),
            (13, "TYPE_UINT32"),
            (14, "TYPE_ENUM"),
            (15, "TYPE_SFIXED32"),
            (16, "TYPE_SFIXED64"),
            (17, "TYPE_SINT32"),
            (18, "TYPE_SINT64"),
        ];

        pub fn serialize<S: Serializer>(value: &Option<i32>, s: S) -> Result<S::Ok, S::Error> {
            super::serialize(NAMES, value, s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
            super::deserialize(NAMES, d)
        }
    }
}
