//! Content model instances.
//!
//! A [`ContentModel`] is bound to exactly one page type by name and holds one
//! [`RegionValue`] per region of that type. Values mirror the shape of their
//! definitions, and block instances carry their discriminator so a block list
//! can be reconstructed from storage or from a form post.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{EntityKind, FieldDefinition, FieldKind, ScalarKind};

/// A leaf value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScalarValue {
    String(String),
    Text(String),
    Html(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(Option<NaiveDate>),
    DateTime(Option<DateTime<Utc>>),
}

impl ScalarValue {
    /// Zero value for a kind.
    pub fn zero(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::String => ScalarValue::String(String::new()),
            ScalarKind::Text => ScalarValue::Text(String::new()),
            ScalarKind::Html => ScalarValue::Html(String::new()),
            ScalarKind::Integer => ScalarValue::Integer(0),
            ScalarKind::Float => ScalarValue::Float(0.0),
            ScalarKind::Boolean => ScalarValue::Boolean(false),
            ScalarKind::Date => ScalarValue::Date(None),
            ScalarKind::DateTime => ScalarValue::DateTime(None),
        }
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::String(_) => ScalarKind::String,
            ScalarValue::Text(_) => ScalarKind::Text,
            ScalarValue::Html(_) => ScalarKind::Html,
            ScalarValue::Integer(_) => ScalarKind::Integer,
            ScalarValue::Float(_) => ScalarKind::Float,
            ScalarValue::Boolean(_) => ScalarKind::Boolean,
            ScalarValue::Date(_) => ScalarKind::Date,
            ScalarValue::DateTime(_) => ScalarKind::DateTime,
        }
    }

    /// Coerce raw form input into a value of `kind`.
    ///
    /// Empty input yields the zero value for every kind.
    pub fn coerce(kind: ScalarKind, raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        match kind {
            ScalarKind::String => Ok(ScalarValue::String(raw.to_string())),
            ScalarKind::Text => Ok(ScalarValue::Text(raw.to_string())),
            ScalarKind::Html => Ok(ScalarValue::Html(raw.to_string())),
            _ if trimmed.is_empty() => Ok(ScalarValue::zero(kind)),
            ScalarKind::Integer => trimmed
                .parse::<i64>()
                .map(ScalarValue::Integer)
                .map_err(|_| format!("'{trimmed}' is not an integer")),
            ScalarKind::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(ScalarValue::Float)
                .ok_or_else(|| format!("'{trimmed}' is not a number")),
            ScalarKind::Boolean => parse_bool(trimmed)
                .map(ScalarValue::Boolean)
                .ok_or_else(|| format!("'{trimmed}' is not a boolean")),
            ScalarKind::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|d| ScalarValue::Date(Some(d)))
                .map_err(|_| format!("'{trimmed}' is not a date (YYYY-MM-DD)")),
            ScalarKind::DateTime => parse_datetime(trimmed)
                .map(|dt| ScalarValue::DateTime(Some(dt)))
                .ok_or_else(|| format!("'{trimmed}' is not a date and time")),
        }
    }

    /// Render the value the way a form field would post it.
    pub fn to_form_value(&self) -> String {
        match self {
            ScalarValue::String(s) | ScalarValue::Text(s) | ScalarValue::Html(s) => s.clone(),
            ScalarValue::Integer(n) => n.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::Boolean(b) => b.to_string(),
            ScalarValue::Date(d) => d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            ScalarValue::DateTime(dt) => dt.map(|dt| dt.to_rfc3339()).unwrap_or_default(),
        }
    }

    /// String content for the three text kinds.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) | ScalarValue::Text(s) | ScalarValue::Html(s) => Some(s),
            _ => None,
        }
    }
}

/// Parse a form boolean. Checkbox posts send "on"; hidden fallbacks send "false".
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Some(true),
        "false" | "off" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // HTML datetime-local inputs omit the offset; treat them as UTC.
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Value of a field inside an object or block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(ScalarValue),
    Object(ObjectValue),
}

impl FieldValue {
    /// Fully defaulted value for a field definition.
    pub fn default_for(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::Scalar(k) => FieldValue::Scalar(ScalarValue::zero(*k)),
            FieldKind::Object(fields) => FieldValue::Object(ObjectValue::default_for(fields)),
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            FieldValue::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            FieldValue::Object(o) => Some(o),
            FieldValue::Scalar(_) => None,
        }
    }
}

/// A nested object: named field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectValue {
    pub fields: BTreeMap<String, FieldValue>,
}

impl ObjectValue {
    /// Recursively default every field in `fields`.
    pub fn default_for(fields: &[FieldDefinition]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|f| (f.name.clone(), FieldValue::default_for(&f.kind)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Follow a dotted field path (`["Link", "Url"]`) to a scalar.
    pub fn scalar_at(&self, path: &[&str]) -> Option<&ScalarValue> {
        let (first, rest) = path.split_first()?;
        match self.fields.get(*first)? {
            FieldValue::Scalar(v) if rest.is_empty() => Some(v),
            FieldValue::Object(o) if !rest.is_empty() => o.scalar_at(rest),
            _ => None,
        }
    }
}

/// One element of a block collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInstance {
    /// Discriminator: the block type this instance was built from.
    #[serde(rename = "__type")]
    pub block_type: String,
    pub fields: ObjectValue,
}

impl BlockInstance {
    pub fn scalar_at(&self, path: &[&str]) -> Option<&ScalarValue> {
        self.fields.scalar_at(path)
    }
}

/// Value of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionValue {
    Scalar(ScalarValue),
    Object(ObjectValue),
    Blocks(Vec<BlockInstance>),
}

impl RegionValue {
    pub fn as_blocks(&self) -> Option<&[BlockInstance]> {
        match self {
            RegionValue::Blocks(blocks) => Some(blocks),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            RegionValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            RegionValue::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

/// A named region value within a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub value: RegionValue,
}

/// A content entity instance built from a page type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentModel {
    /// Unique identifier (UUIDv7); `None` until first saved.
    pub id: Option<Uuid>,

    /// Page type this model was built from.
    pub type_name: String,

    pub kind: EntityKind,

    /// Internal route handed to the rendering collaborator.
    pub route: String,

    pub title: String,

    /// URL segment for this entity; joined with ancestor slugs into the permalink.
    pub slug: String,

    /// Parent entity for hierarchical content.
    pub parent_id: Option<Uuid>,

    /// Publication time. `None` (or a future time) means unpublished.
    pub published: Option<DateTime<Utc>>,

    pub meta_keywords: String,
    pub meta_description: String,
    pub excerpt: String,

    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,

    /// Region values in page type order.
    pub regions: Vec<Region>,
}

impl ContentModel {
    pub fn region(&self, name: &str) -> Option<&RegionValue> {
        self.regions.iter().find(|r| r.name == name).map(|r| &r.value)
    }

    pub fn region_mut(&mut self, name: &str) -> Option<&mut RegionValue> {
        self.regions
            .iter_mut()
            .find(|r| r.name == name)
            .map(|r| &mut r.value)
    }

    /// Blocks of a block region, empty for unknown or non-block regions.
    pub fn blocks(&self, region: &str) -> &[BlockInstance] {
        self.region(region)
            .and_then(RegionValue::as_blocks)
            .unwrap_or_default()
    }

    /// Whether the entity is visible at `now`.
    pub fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        self.published.is_some_and(|p| p <= now)
    }

    pub fn is_published(&self) -> bool {
        self.is_published_at(Utc::now())
    }
}
