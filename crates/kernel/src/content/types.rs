//! Page type and block type definitions.
//!
//! Definitions are produced by the type builder and are immutable once a
//! generation has been published to the registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Leaf value kinds a region or field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    /// Single-line text.
    String,
    /// Multi-line plain text.
    Text,
    /// HTML markup (sanitization is the renderer's concern).
    Html,
    Integer,
    Float,
    Boolean,
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// UTC timestamp.
    DateTime,
}

impl ScalarKind {
    /// All kinds, in the order they are documented.
    pub const ALL: [ScalarKind; 8] = [
        ScalarKind::String,
        ScalarKind::Text,
        ScalarKind::Html,
        ScalarKind::Integer,
        ScalarKind::Float,
        ScalarKind::Boolean,
        ScalarKind::Date,
        ScalarKind::DateTime,
    ];

    /// Machine name used in type documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Text => "text",
            ScalarKind::Html => "html",
            ScalarKind::Integer => "integer",
            ScalarKind::Float => "float",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Date => "date",
            ScalarKind::DateTime => "datetime",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScalarKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// Kind of a field inside an object or block.
///
/// Fields never hold block collections, which keeps binding unambiguous and
/// the nesting finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar(ScalarKind),
    Object(Vec<FieldDefinition>),
}

/// A named field within an object region or a block type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDefinition {
    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar(kind),
        }
    }

    pub fn object(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Object(fields),
        }
    }
}

/// Look up a field by name in a field list.
pub fn find_field<'a>(fields: &'a [FieldDefinition], name: &str) -> Option<&'a FieldDefinition> {
    fields.iter().find(|f| f.name == name)
}

/// Kind of a region within a page type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Scalar(ScalarKind),
    Object(Vec<FieldDefinition>),
    /// Ordered list of polymorphic blocks; holds the allowed block type names.
    Blocks(Vec<String>),
}

/// A named slot within a page type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDefinition {
    pub name: String,
    pub kind: RegionKind,
}

impl RegionDefinition {
    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind: RegionKind::Scalar(kind),
        }
    }

    pub fn object(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: name.into(),
            kind: RegionKind::Object(fields),
        }
    }

    pub fn blocks<I, S>(name: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: RegionKind::Blocks(allowed.into_iter().map(Into::into).collect()),
        }
    }

    /// Allowed block type names, or `None` for non-block regions.
    pub fn allowed_blocks(&self) -> Option<&[String]> {
        match &self.kind {
            RegionKind::Blocks(allowed) => Some(allowed),
            _ => None,
        }
    }

    /// Check whether this block region accepts the given discriminator.
    pub fn allows_block(&self, block_type: &str) -> bool {
        self.allowed_blocks()
            .is_some_and(|allowed| allowed.iter().any(|b| b == block_type))
    }
}

/// Whether entities of a type are pages or posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Page,
    Post,
}

impl EntityKind {
    /// Route name used when a type does not declare one.
    pub fn default_route(&self) -> &'static str {
        match self {
            EntityKind::Page => "page",
            EntityKind::Post => "post",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Page => "page",
            EntityKind::Post => "post",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "page" => Ok(EntityKind::Page),
            "post" => Ok(EntityKind::Post),
            _ => Err(()),
        }
    }
}

/// A page type: the schema of a content entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Unique name (e.g. "Start", "Article").
    pub name: String,
    /// Human-readable label.
    pub title: String,
    pub kind: EntityKind,
    /// Logical route name handed to the rendering collaborator.
    pub route: String,
    /// Regions in source order.
    pub regions: Vec<RegionDefinition>,
}

impl TypeDefinition {
    /// Create a page type with the default route for its kind.
    pub fn new(name: impl Into<String>, kind: EntityKind, regions: Vec<RegionDefinition>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            kind,
            route: kind.default_route().to_string(),
            regions,
        }
    }

    pub fn region(&self, name: &str) -> Option<&RegionDefinition> {
        self.regions.iter().find(|r| r.name == name)
    }
}

/// A block type: the schema of one reusable content fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTypeDefinition {
    pub name: String,
    pub title: String,
    pub fields: Vec<FieldDefinition>,
}

impl BlockTypeDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        find_field(&self.fields, name)
    }
}
