//! Type builder.
//!
//! Parses declarative type documents (JSON or YAML) into a new registry
//! generation. All block types across all sources are collected first, then
//! page types, so a page type may reference a block type declared in any
//! source. Structural problems are collected rather than reported one at a
//! time; if any are found the registry keeps serving its previous generation.
//!
//! ```json
//! {
//!   "blockTypes": [
//!     { "name": "TextBlock", "fields": [ { "name": "Body", "kind": "html" } ] }
//!   ],
//!   "pageTypes": [
//!     { "name": "Start", "route": "start",
//!       "regions": [ { "name": "Body", "kind": "blocks", "allowedBlocks": ["TextBlock"] } ] }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::binder::is_bindable_name;
use super::type_registry::{GenerationBuilder, TypeRegistry};
use super::types::{
    BlockTypeDefinition, EntityKind, FieldDefinition, FieldKind, RegionDefinition, RegionKind,
    ScalarKind, TypeDefinition,
};

/// Kind name for block collection regions.
const BLOCKS_KIND: &str = "blocks";
/// Kind name for nested objects.
const OBJECT_KIND: &str = "object";

/// A structural problem found while building types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("{document}: {message}")]
    Unreadable { document: String, message: String },

    #[error("block type '{name}' is defined more than once (in {})", .documents.join(", "))]
    DuplicateBlockType { name: String, documents: Vec<String> },

    #[error("page type '{name}' is defined more than once (in {})", .documents.join(", "))]
    DuplicatePageType { name: String, documents: Vec<String> },

    #[error("{document}: {owner} has a {what} without a name")]
    MissingName {
        document: String,
        owner: String,
        what: &'static str,
    },

    #[error("{owner}: '{name}' is not a valid region or field name")]
    InvalidName { owner: String, name: String },

    #[error("{owner}: field '{field}' is defined more than once")]
    DuplicateField { owner: String, field: String },

    #[error("page type '{page_type}': region '{region}' is defined more than once")]
    DuplicateRegion { page_type: String, region: String },

    #[error("{owner}: field '{field}' has unknown kind '{kind}'")]
    UnknownFieldKind {
        owner: String,
        field: String,
        kind: String,
    },

    #[error("page type '{page_type}': region '{region}' has unknown kind '{kind}'")]
    UnknownRegionKind {
        page_type: String,
        region: String,
        kind: String,
    },

    #[error("{owner}: field '{field}' cannot hold blocks")]
    NestedBlockCollection { owner: String, field: String },

    #[error("page type '{page_type}' declares no regions")]
    NoRegions { page_type: String },

    #[error("page type '{page_type}': region '{region}' allows no block types")]
    NoAllowedBlocks { page_type: String, region: String },

    #[error("page type '{page_type}': region '{region}' references unknown block type '{block_type}'")]
    UnknownBlockType {
        page_type: String,
        region: String,
        block_type: String,
    },

    #[error("page type '{page_type}' has unknown entity kind '{kind}'")]
    UnknownEntityKind { page_type: String, kind: String },
}

/// Every structural error from one build pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildError {
    pub errors: Vec<StructuralError>,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type build failed with {} structural error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildError {}

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Id of the generation that was activated.
    pub generation: u64,
    pub page_types: usize,
    pub block_types: usize,
    /// Names of the documents that were merged.
    pub sources: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeDocument {
    #[serde(default)]
    block_types: Vec<RawBlockType>,
    #[serde(default)]
    page_types: Vec<RawPageType>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    #[serde(default)]
    name: String,
    kind: String,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawBlockType {
    #[serde(default)]
    name: String,
    title: Option<String>,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRegion {
    #[serde(default)]
    name: String,
    kind: String,
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    allowed_blocks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPageType {
    #[serde(default)]
    name: String,
    title: Option<String>,
    kind: Option<String>,
    route: Option<String>,
    #[serde(default)]
    regions: Vec<RawRegion>,
}

#[derive(Debug, Clone)]
enum SourceFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone)]
enum TypeSource {
    Text {
        name: String,
        format: SourceFormat,
        text: String,
    },
    Value {
        name: String,
        value: serde_json::Value,
    },
    File(PathBuf),
}

impl TypeSource {
    fn name(&self) -> String {
        match self {
            TypeSource::Text { name, .. } | TypeSource::Value { name, .. } => name.clone(),
            TypeSource::File(path) => path.display().to_string(),
        }
    }

    fn parse(&self) -> Result<TypeDocument, String> {
        match self {
            TypeSource::Text { format, text, .. } => parse_text(format, text),
            TypeSource::Value { value, .. } => {
                serde_json::from_value(value.clone()).map_err(|e| e.to_string())
            }
            TypeSource::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
                parse_text(&format_for_path(path), &text)
            }
        }
    }
}

fn parse_text(format: &SourceFormat, text: &str) -> Result<TypeDocument, String> {
    match format {
        SourceFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        SourceFormat::Yaml => serde_yml::from_str(text).map_err(|e| e.to_string()),
    }
}

fn format_for_path(path: &Path) -> SourceFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => SourceFormat::Yaml,
        _ => SourceFormat::Json,
    }
}

/// Builds a registry generation from one or more type documents.
pub struct TypeBuilder {
    registry: TypeRegistry,
    sources: Vec<TypeSource>,
}

impl TypeBuilder {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            sources: Vec::new(),
        }
    }

    /// Add a JSON document held in memory.
    pub fn add_json(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.sources.push(TypeSource::Text {
            name: name.into(),
            format: SourceFormat::Json,
            text: text.into(),
        });
        self
    }

    /// Add a YAML document held in memory.
    pub fn add_yaml(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.sources.push(TypeSource::Text {
            name: name.into(),
            format: SourceFormat::Yaml,
            text: text.into(),
        });
        self
    }

    /// Add an already-parsed JSON document.
    pub fn add_value(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.sources.push(TypeSource::Value {
            name: name.into(),
            value,
        });
        self
    }

    /// Add a document on disk; `.yaml`/`.yml` files are read as YAML, anything
    /// else as JSON. The file is read when [`build`](Self::build) runs.
    pub fn add_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(TypeSource::File(path.into()));
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Validate every source and, if all are structurally sound, activate the
    /// result as the registry's new generation.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let mut errors = Vec::new();
        let mut documents = Vec::new();
        for source in &self.sources {
            let name = source.name();
            match source.parse() {
                Ok(doc) => documents.push((name, doc)),
                Err(message) => errors.push(StructuralError::Unreadable {
                    document: name,
                    message,
                }),
            }
        }

        let mut generation = GenerationBuilder::new();
        let declared_blocks = collect_block_types(&documents, &mut generation, &mut errors);
        collect_page_types(&documents, &declared_blocks, &mut generation, &mut errors);

        if !errors.is_empty() {
            warn!(
                errors = errors.len(),
                generation = self.registry.generation(),
                "type build failed; keeping current generation"
            );
            return Err(BuildError { errors });
        }

        let generation = generation.finish();
        let page_types = generation.type_count();
        let block_types = generation.block_type_count();
        let id = self.registry.replace_all(generation);
        let sources: Vec<String> = documents.into_iter().map(|(name, _)| name).collect();

        info!(
            generation = id,
            page_types,
            block_types,
            sources = sources.len(),
            "types built"
        );

        Ok(BuildReport {
            generation: id,
            page_types,
            block_types,
            sources,
        })
    }
}

/// Map each declared name to the documents that declare it.
fn index_names<'a, I>(names: I) -> BTreeMap<&'a str, Vec<String>>
where
    I: Iterator<Item = (&'a str, &'a str)>,
{
    let mut seen: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (document, name) in names {
        seen.entry(name).or_default().push(document.to_string());
    }
    seen
}

/// First pass: block types. Returns every declared block type name so page
/// type references can be checked independently of block validity.
fn collect_block_types<'a>(
    documents: &'a [(String, TypeDocument)],
    generation: &mut GenerationBuilder,
    errors: &mut Vec<StructuralError>,
) -> HashSet<&'a str> {
    let seen = index_names(documents.iter().flat_map(|(doc_name, doc)| {
        doc.block_types
            .iter()
            .filter(|b| !b.name.is_empty())
            .map(move |b| (doc_name.as_str(), b.name.as_str()))
    }));

    for (name, docs) in &seen {
        if docs.len() > 1 {
            errors.push(StructuralError::DuplicateBlockType {
                name: (*name).to_string(),
                documents: docs.clone(),
            });
        }
    }

    for (doc_name, doc) in documents {
        for raw in &doc.block_types {
            if raw.name.is_empty() {
                errors.push(StructuralError::MissingName {
                    document: doc_name.clone(),
                    owner: "blockTypes".to_string(),
                    what: "block type",
                });
                continue;
            }
            let owner = format!("block type '{}'", raw.name);
            let fields = convert_fields(doc_name, &owner, &raw.fields, errors);
            let duplicated = seen.get(raw.name.as_str()).is_some_and(|d| d.len() > 1);
            if let (Some(fields), false) = (fields, duplicated) {
                let definition = BlockTypeDefinition {
                    name: raw.name.clone(),
                    title: raw.title.clone().unwrap_or_else(|| raw.name.clone()),
                    fields,
                };
                if let Err(e) = generation.register_block(definition) {
                    // Duplicates are filtered above; keep the report complete regardless.
                    warn!(error = %e, "unexpected duplicate block type");
                }
            }
        }
    }

    seen.into_keys().collect()
}

/// Second pass: page types, resolving block references against `declared_blocks`.
fn collect_page_types(
    documents: &[(String, TypeDocument)],
    declared_blocks: &HashSet<&str>,
    generation: &mut GenerationBuilder,
    errors: &mut Vec<StructuralError>,
) {
    let seen = index_names(documents.iter().flat_map(|(doc_name, doc)| {
        doc.page_types
            .iter()
            .filter(|p| !p.name.is_empty())
            .map(move |p| (doc_name.as_str(), p.name.as_str()))
    }));

    for (name, docs) in &seen {
        if docs.len() > 1 {
            errors.push(StructuralError::DuplicatePageType {
                name: (*name).to_string(),
                documents: docs.clone(),
            });
        }
    }

    for (doc_name, doc) in documents {
        for raw in &doc.page_types {
            if raw.name.is_empty() {
                errors.push(StructuralError::MissingName {
                    document: doc_name.clone(),
                    owner: "pageTypes".to_string(),
                    what: "page type",
                });
                continue;
            }
            let definition = convert_page_type(doc_name, raw, declared_blocks, errors);
            let duplicated = seen.get(raw.name.as_str()).is_some_and(|d| d.len() > 1);
            if let (Some(definition), false) = (definition, duplicated) {
                if let Err(e) = generation.register(definition) {
                    // Duplicates and unknown block references are reported above.
                    warn!(error = %e, "page type not registered");
                }
            }
        }
    }
}

fn convert_page_type(
    document: &str,
    raw: &RawPageType,
    declared_blocks: &HashSet<&str>,
    errors: &mut Vec<StructuralError>,
) -> Option<TypeDefinition> {
    let before = errors.len();

    let kind = match raw.kind.as_deref() {
        None => EntityKind::Page,
        Some(k) => k.parse().unwrap_or_else(|()| {
            errors.push(StructuralError::UnknownEntityKind {
                page_type: raw.name.clone(),
                kind: k.to_string(),
            });
            EntityKind::Page
        }),
    };

    if raw.regions.is_empty() {
        errors.push(StructuralError::NoRegions {
            page_type: raw.name.clone(),
        });
    }

    let mut region_names = HashSet::new();
    let mut regions = Vec::with_capacity(raw.regions.len());
    for region in &raw.regions {
        if region.name.is_empty() {
            errors.push(StructuralError::MissingName {
                document: document.to_string(),
                owner: format!("page type '{}'", raw.name),
                what: "region",
            });
            continue;
        }
        if !is_bindable_name(&region.name) {
            errors.push(StructuralError::InvalidName {
                owner: format!("page type '{}'", raw.name),
                name: region.name.clone(),
            });
            continue;
        }
        if !region_names.insert(region.name.as_str()) {
            errors.push(StructuralError::DuplicateRegion {
                page_type: raw.name.clone(),
                region: region.name.clone(),
            });
            continue;
        }
        if let Some(converted) = convert_region(document, &raw.name, region, declared_blocks, errors)
        {
            regions.push(converted);
        }
    }

    if errors.len() > before {
        return None;
    }

    Some(TypeDefinition {
        name: raw.name.clone(),
        title: raw.title.clone().unwrap_or_else(|| raw.name.clone()),
        kind,
        route: raw
            .route
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| kind.default_route().to_string()),
        regions,
    })
}

fn convert_region(
    document: &str,
    page_type: &str,
    raw: &RawRegion,
    declared_blocks: &HashSet<&str>,
    errors: &mut Vec<StructuralError>,
) -> Option<RegionDefinition> {
    let kind = match raw.kind.to_ascii_lowercase().as_str() {
        BLOCKS_KIND => {
            if raw.allowed_blocks.is_empty() {
                errors.push(StructuralError::NoAllowedBlocks {
                    page_type: page_type.to_string(),
                    region: raw.name.clone(),
                });
                return None;
            }
            let mut resolvable = true;
            for block_type in &raw.allowed_blocks {
                if !declared_blocks.contains(block_type.as_str()) {
                    errors.push(StructuralError::UnknownBlockType {
                        page_type: page_type.to_string(),
                        region: raw.name.clone(),
                        block_type: block_type.clone(),
                    });
                    resolvable = false;
                }
            }
            if !resolvable {
                return None;
            }
            let mut allowed = Vec::with_capacity(raw.allowed_blocks.len());
            for block_type in &raw.allowed_blocks {
                if !allowed.contains(block_type) {
                    allowed.push(block_type.clone());
                }
            }
            RegionKind::Blocks(allowed)
        }
        OBJECT_KIND => {
            let owner = format!("page type '{page_type}', region '{}'", raw.name);
            RegionKind::Object(convert_fields(document, &owner, &raw.fields, errors)?)
        }
        other => match other.parse::<ScalarKind>() {
            Ok(scalar) => RegionKind::Scalar(scalar),
            Err(()) => {
                errors.push(StructuralError::UnknownRegionKind {
                    page_type: page_type.to_string(),
                    region: raw.name.clone(),
                    kind: raw.kind.clone(),
                });
                return None;
            }
        },
    };

    Some(RegionDefinition {
        name: raw.name.clone(),
        kind,
    })
}

/// Convert a field list, recursing into nested objects. Returns `None` when
/// any field in the list (or below it) is invalid.
fn convert_fields(
    document: &str,
    owner: &str,
    raw: &[RawField],
    errors: &mut Vec<StructuralError>,
) -> Option<Vec<FieldDefinition>> {
    let before = errors.len();
    let mut names = HashSet::new();
    let mut fields = Vec::with_capacity(raw.len());

    for field in raw {
        if field.name.is_empty() {
            errors.push(StructuralError::MissingName {
                document: document.to_string(),
                owner: owner.to_string(),
                what: "field",
            });
            continue;
        }
        if !is_bindable_name(&field.name) {
            errors.push(StructuralError::InvalidName {
                owner: owner.to_string(),
                name: field.name.clone(),
            });
            continue;
        }
        if !names.insert(field.name.as_str()) {
            errors.push(StructuralError::DuplicateField {
                owner: owner.to_string(),
                field: field.name.clone(),
            });
            continue;
        }

        let kind = match field.kind.to_ascii_lowercase().as_str() {
            BLOCKS_KIND => {
                errors.push(StructuralError::NestedBlockCollection {
                    owner: owner.to_string(),
                    field: field.name.clone(),
                });
                continue;
            }
            OBJECT_KIND => {
                let nested_owner = format!("{owner}, field '{}'", field.name);
                match convert_fields(document, &nested_owner, &field.fields, errors) {
                    Some(nested) => FieldKind::Object(nested),
                    None => continue,
                }
            }
            other => match other.parse::<ScalarKind>() {
                Ok(scalar) => FieldKind::Scalar(scalar),
                Err(()) => {
                    errors.push(StructuralError::UnknownFieldKind {
                        owner: owner.to_string(),
                        field: field.name.clone(),
                        kind: field.kind.clone(),
                    });
                    continue;
                }
            },
        };

        fields.push(FieldDefinition {
            name: field.name.clone(),
            kind,
        });
    }

    (errors.len() == before).then_some(fields)
}
