//! Polymorphic form binder.
//!
//! Reconciles a flattened form post into a [`ContentModel`]. Keys are dotted
//! paths whose segments may carry an index:
//!
//! ```text
//! Heading              = Welcome
//! Intro.Title          = Say hi
//! Body[0].__type       = TextBlock
//! Body[0].Body         = <p>Lorem</p>
//! Body[1].__type       = ImageBlock
//! Body[1].Link.Url     = /media/cat.jpg
//! ```
//!
//! Each element of a block region names its block type through the `__type`
//! discriminator. A bad element is skipped and reported; a bad field is
//! reported while the rest of its block still binds. Errors are returned with
//! the bound model, never raised.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::factory::{ContentModelFactory, block_for};
use super::model::{
    BlockInstance, ContentModel, FieldValue, ObjectValue, Region, RegionValue, ScalarValue,
    parse_bool,
};
use super::type_registry::{TypeError, TypeGeneration};
use super::types::{
    FieldDefinition, FieldKind, RegionDefinition, RegionKind, ScalarKind, find_field,
};

/// Field name carrying a block element's type.
pub const DISCRIMINATOR: &str = "__type";

/// A flattened form post: key/value pairs in submission order.
pub type FieldSet = Vec<(String, String)>;

/// One path segment: `Body[2]` or `Title`.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_\-]*)(?:\[(\d{1,6})\])?$").expect("valid regex literal")
});

/// Whether `name` can be addressed as a region or field in a form key.
///
/// The discriminator is reserved.
pub fn is_bindable_name(name: &str) -> bool {
    name != DISCRIMINATOR && SEGMENT.captures(name).is_some_and(|c| c.get(2).is_none())
}

/// Why a whole block element was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason", content = "block_type", rename_all = "snake_case")]
pub enum BlockFailure {
    #[error("missing '__type' discriminator")]
    MissingDiscriminator,

    #[error("block type '{0}' is not allowed in this region")]
    NotAllowed(String),

    #[error("block type '{0}' is not registered")]
    Unregistered(String),
}

/// A non-fatal binding problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum BindingError {
    /// The element at `index` was omitted from the bound list.
    #[error("{region}[{index}]: {reason}")]
    Block {
        region: String,
        index: usize,
        reason: BlockFailure,
    },

    /// One field failed to bind; its previous (or default) value was kept.
    #[error("{key}: {message}")]
    Field {
        region: String,
        index: Option<usize>,
        key: String,
        message: String,
    },
}

impl BindingError {
    pub fn region(&self) -> &str {
        match self {
            BindingError::Block { region, .. } | BindingError::Field { region, .. } => region,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            BindingError::Block { index, .. } => Some(*index),
            BindingError::Field { index, .. } => *index,
        }
    }
}

/// Result of a bind: the best-effort model plus every problem encountered.
#[derive(Debug, Clone)]
pub struct BindOutcome {
    pub model: ContentModel,
    pub errors: Vec<BindingError>,
}

impl BindOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug)]
struct Segment<'a> {
    name: &'a str,
    index: Option<usize>,
}

fn parse_key(key: &str) -> Option<Vec<Segment<'_>>> {
    key.split('.')
        .map(|part| {
            let caps = SEGMENT.captures(part)?;
            let name = caps.get(1)?.as_str();
            let index = match caps.get(2) {
                Some(m) => Some(m.as_str().parse().ok()?),
                None => None,
            };
            Some(Segment { name, index })
        })
        .collect()
}

/// Posted values for one field path, with the key they arrived under.
#[derive(Debug, Default)]
struct Posted<'a> {
    key: &'a str,
    values: Vec<&'a str>,
}

type PathInputs<'a> = BTreeMap<String, Posted<'a>>;

#[derive(Debug, Default)]
struct RegionInputs<'a> {
    scalars: BTreeMap<&'a str, Posted<'a>>,
    objects: BTreeMap<&'a str, PathInputs<'a>>,
    blocks: BTreeMap<&'a str, BTreeMap<usize, PathInputs<'a>>>,
    /// Block regions mentioned in the post, even if empty.
    present: BTreeSet<&'a str>,
}

fn push<'a>(inputs: &mut PathInputs<'a>, path: String, key: &'a str, value: &'a str) {
    let posted = inputs.entry(path).or_default();
    posted.key = key;
    posted.values.push(value);
}

fn field_error(region: &str, index: Option<usize>, key: &str, message: impl Into<String>) -> BindingError {
    BindingError::Field {
        region: region.to_string(),
        index,
        key: key.to_string(),
        message: message.into(),
    }
}

/// Binds flattened form data to content models.
#[derive(Clone)]
pub struct PolymorphicBinder {
    factory: ContentModelFactory,
    prefix: Option<String>,
}

impl PolymorphicBinder {
    pub fn new(factory: ContentModelFactory) -> Self {
        Self {
            factory,
            prefix: None,
        }
    }

    /// Only bind keys under `prefix.` (e.g. `Regions.Body[0].Title`); keys
    /// under the prefix that name no region are reported.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into()).filter(|p: &String| !p.is_empty());
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Bind `fields` into `model` using the active registry generation.
    pub fn bind(&self, model: ContentModel, fields: &[(String, String)]) -> Result<BindOutcome, TypeError> {
        bind_fields(&self.factory.snapshot(), self.prefix.as_deref(), model, fields)
    }

    /// Flatten a model into the field set that binds back to it.
    pub fn flatten(&self, model: &ContentModel) -> FieldSet {
        flatten_model(model, self.prefix.as_deref())
    }
}

/// Bind a flattened field set into `model` against one registry generation.
pub fn bind_fields(
    generation: &TypeGeneration,
    prefix: Option<&str>,
    mut model: ContentModel,
    fields: &[(String, String)],
) -> Result<BindOutcome, TypeError> {
    let definition = generation.resolve(&model.type_name)?;
    let mut errors = Vec::new();
    let mut inputs = RegionInputs::default();

    for (key, value) in fields {
        let (rest, strict) = match prefix {
            Some(p) => match key.strip_prefix(p).and_then(|r| r.strip_prefix('.')) {
                Some(rest) => (rest, true),
                None => continue,
            },
            None => (key.as_str(), false),
        };

        let Some(segments) = parse_key(rest) else {
            if strict {
                errors.push(field_error("", None, key, "malformed field key"));
            }
            continue;
        };
        let (head, tail) = match segments.split_first() {
            Some(split) => split,
            None => continue,
        };
        let Some(region) = definition.region(head.name) else {
            if strict {
                errors.push(field_error(head.name, None, key, "unknown region"));
            }
            continue;
        };

        if tail.iter().any(|s| s.index.is_some()) {
            errors.push(field_error(
                &region.name,
                head.index,
                key,
                "only the block region segment may carry an index",
            ));
            continue;
        }
        let path = tail.iter().map(|s| s.name).collect::<Vec<_>>().join(".");

        match (&region.kind, head.index) {
            (RegionKind::Blocks(_), None) if tail.is_empty() => {
                inputs.present.insert(head.name);
            }
            (RegionKind::Blocks(_), Some(index)) if !tail.is_empty() => {
                inputs.present.insert(head.name);
                let group = inputs
                    .blocks
                    .entry(head.name)
                    .or_default()
                    .entry(index)
                    .or_default();
                push(group, path, key, value);
            }
            (RegionKind::Blocks(_), _) => {
                errors.push(field_error(
                    &region.name,
                    head.index,
                    key,
                    "block fields must be posted as Region[index].Field",
                ));
            }
            (RegionKind::Scalar(_), None) if tail.is_empty() => {
                let posted = inputs.scalars.entry(head.name).or_default();
                posted.key = key;
                posted.values.push(value);
            }
            (RegionKind::Object(_), None) if !tail.is_empty() => {
                push(inputs.objects.entry(head.name).or_default(), path, key, value);
            }
            _ => {
                errors.push(field_error(
                    &region.name,
                    head.index,
                    key,
                    "field key does not match the region's shape",
                ));
            }
        }
    }

    for region in &definition.regions {
        let name = region.name.as_str();
        match &region.kind {
            RegionKind::Scalar(kind) => {
                let Some(posted) = inputs.scalars.get(name) else {
                    continue;
                };
                match coerce_values(*kind, &posted.values) {
                    Ok(value) => set_region(&mut model, name, RegionValue::Scalar(value)),
                    Err(message) => errors.push(field_error(name, None, posted.key, message)),
                }
            }
            RegionKind::Object(defs) => {
                let Some(paths) = inputs.objects.get(name) else {
                    continue;
                };
                let mut object = model
                    .region(name)
                    .and_then(RegionValue::as_object)
                    .cloned()
                    .unwrap_or_else(|| ObjectValue::default_for(defs));
                bind_object(&mut object, defs, paths, name, None, &mut errors);
                set_region(&mut model, name, RegionValue::Object(object));
            }
            RegionKind::Blocks(_) => {
                if !inputs.present.contains(name) {
                    continue;
                }
                let groups = inputs.blocks.remove(name).unwrap_or_default();
                let blocks = bind_blocks(generation, region, groups, &mut errors);
                set_region(&mut model, name, RegionValue::Blocks(blocks));
            }
        }
    }

    debug!(
        type_name = %model.type_name,
        fields = fields.len(),
        errors = errors.len(),
        "bound form fields"
    );

    Ok(BindOutcome { model, errors })
}

fn set_region(model: &mut ContentModel, name: &str, value: RegionValue) {
    match model.region_mut(name) {
        Some(slot) => *slot = value,
        None => model.regions.push(Region {
            name: name.to_string(),
            value,
        }),
    }
}

fn bind_blocks(
    generation: &TypeGeneration,
    region: &RegionDefinition,
    groups: BTreeMap<usize, PathInputs<'_>>,
    errors: &mut Vec<BindingError>,
) -> Vec<BlockInstance> {
    let mut blocks = Vec::with_capacity(groups.len());

    for (index, mut group) in groups {
        let discriminator = group
            .remove(DISCRIMINATOR)
            .and_then(|posted| posted.values.last().map(|v| v.trim().to_string()))
            .filter(|d| !d.is_empty());

        let failure = match discriminator {
            None => Some(BlockFailure::MissingDiscriminator),
            Some(ref d) if !region.allows_block(d) => Some(BlockFailure::NotAllowed(d.clone())),
            Some(_) => None,
        };
        if let Some(reason) = failure {
            errors.push(BindingError::Block {
                region: region.name.clone(),
                index,
                reason,
            });
            continue;
        }
        let block_type = discriminator.unwrap_or_default();

        let Ok(definition) = generation.resolve_block(&block_type) else {
            errors.push(BindingError::Block {
                region: region.name.clone(),
                index,
                reason: BlockFailure::Unregistered(block_type),
            });
            continue;
        };
        let mut block = block_for(&definition);

        bind_object(
            &mut block.fields,
            &definition.fields,
            &group,
            &region.name,
            Some(index),
            errors,
        );
        blocks.push(block);
    }

    blocks
}

/// Apply posted paths to an object, recording one error per failed path.
fn bind_object(
    object: &mut ObjectValue,
    defs: &[FieldDefinition],
    paths: &PathInputs<'_>,
    region: &str,
    index: Option<usize>,
    errors: &mut Vec<BindingError>,
) {
    for (path, posted) in paths {
        let segments: Vec<&str> = path.split('.').collect();
        if let Err(message) = apply_path(object, defs, &segments, &posted.values) {
            errors.push(field_error(region, index, posted.key, message));
        }
    }
}

fn apply_path(
    object: &mut ObjectValue,
    defs: &[FieldDefinition],
    path: &[&str],
    values: &[&str],
) -> Result<(), String> {
    let Some((first, rest)) = path.split_first() else {
        return Err("empty field path".to_string());
    };
    let def = find_field(defs, first).ok_or_else(|| format!("unknown field '{first}'"))?;

    match &def.kind {
        FieldKind::Scalar(kind) => {
            if !rest.is_empty() {
                return Err(format!("'{first}' is not an object"));
            }
            let value = coerce_values(*kind, values)?;
            object
                .fields
                .insert(def.name.clone(), FieldValue::Scalar(value));
            Ok(())
        }
        FieldKind::Object(nested) => {
            if rest.is_empty() {
                return Err(format!("'{first}' is an object; post its fields instead"));
            }
            let slot = object
                .fields
                .entry(def.name.clone())
                .or_insert_with(|| FieldValue::Object(ObjectValue::default_for(nested)));
            if !matches!(slot, FieldValue::Object(_)) {
                *slot = FieldValue::Object(ObjectValue::default_for(nested));
            }
            match slot {
                FieldValue::Object(inner) => apply_path(inner, nested, rest, values),
                FieldValue::Scalar(_) => Err(format!("'{first}' is not an object")),
            }
        }
    }
}

/// Coerce the values posted under one key.
///
/// Repeated keys keep the last value, except booleans where any truthy value
/// wins (a checkbox posts alongside its hidden "false" fallback).
fn coerce_values(kind: ScalarKind, values: &[&str]) -> Result<ScalarValue, String> {
    if kind == ScalarKind::Boolean && values.len() > 1 {
        let mut any = false;
        for raw in values {
            any |= parse_bool(raw.trim()).ok_or_else(|| format!("'{raw}' is not a boolean"))?;
        }
        return Ok(ScalarValue::Boolean(any));
    }
    ScalarValue::coerce(kind, values.last().copied().unwrap_or_default())
}

/// Flatten a model into form fields, the inverse of [`bind_fields`].
pub fn flatten_model(model: &ContentModel, prefix: Option<&str>) -> FieldSet {
    let mut out = Vec::new();
    let base = prefix.map(|p| format!("{p}.")).unwrap_or_default();

    for region in &model.regions {
        let key = format!("{base}{}", region.name);
        match &region.value {
            RegionValue::Scalar(v) => out.push((key, v.to_form_value())),
            RegionValue::Object(o) => flatten_object(&key, o, &mut out),
            RegionValue::Blocks(blocks) => {
                out.push((key.clone(), String::new()));
                for (i, block) in blocks.iter().enumerate() {
                    let element = format!("{key}[{i}]");
                    out.push((format!("{element}.{DISCRIMINATOR}"), block.block_type.clone()));
                    flatten_object(&element, &block.fields, &mut out);
                }
            }
        }
    }

    out
}

fn flatten_object(prefix: &str, object: &ObjectValue, out: &mut FieldSet) {
    for (name, value) in &object.fields {
        let key = format!("{prefix}.{name}");
        match value {
            FieldValue::Scalar(v) => out.push((key, v.to_form_value())),
            FieldValue::Object(nested) => flatten_object(&key, nested, out),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::factory::ContentModelFactory;
    use crate::content::type_registry::TypeRegistry;
    use crate::content::types::{BlockTypeDefinition, EntityKind, TypeDefinition};

    fn factory() -> ContentModelFactory {
        let registry = TypeRegistry::new();
        registry
            .register_block(BlockTypeDefinition::new(
                "TextBlock",
                vec![
                    FieldDefinition::scalar("Title", ScalarKind::String),
                    FieldDefinition::scalar("Body", ScalarKind::Html),
                ],
            ))
            .unwrap();
        registry
            .register_block(BlockTypeDefinition::new(
                "ImageBlock",
                vec![
                    FieldDefinition::scalar("Width", ScalarKind::Integer),
                    FieldDefinition::object(
                        "Link",
                        vec![
                            FieldDefinition::scalar("Url", ScalarKind::String),
                            FieldDefinition::scalar("NewWindow", ScalarKind::Boolean),
                        ],
                    ),
                ],
            ))
            .unwrap();
        registry
            .register_block(BlockTypeDefinition::new("QuoteBlock", vec![]))
            .unwrap();
        registry
            .register(TypeDefinition::new(
                "Start",
                EntityKind::Page,
                vec![
                    RegionDefinition::scalar("Heading", ScalarKind::String),
                    RegionDefinition::scalar("Featured", ScalarKind::Boolean),
                    RegionDefinition::object(
                        "Intro",
                        vec![
                            FieldDefinition::scalar("Title", ScalarKind::String),
                            FieldDefinition::scalar("Order", ScalarKind::Integer),
                        ],
                    ),
                    RegionDefinition::blocks("Body", ["TextBlock", "ImageBlock"]),
                ],
            ))
            .unwrap();
        ContentModelFactory::new(registry)
    }

    fn post(pairs: &[(&str, &str)]) -> FieldSet {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn parse_key_segments() {
        let segments = parse_key("Body[12].Link.Url").unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].name, "Body");
        assert_eq!(segments[0].index, Some(12));
        assert_eq!(segments[2].index, None);

        assert!(parse_key("Body[x].Title").is_none());
        assert!(parse_key("Body..Title").is_none());
        assert!(parse_key("").is_none());
    }

    #[test]
    fn binds_polymorphic_blocks_in_index_order() {
        let factory = factory();
        let binder = PolymorphicBinder::new(factory.clone());
        let model = factory.create("Start").unwrap();

        let outcome = binder
            .bind(
                model,
                &post(&[
                    ("Body[1].__type", "ImageBlock"),
                    ("Body[1].Width", "640"),
                    ("Body[1].Link.Url", "/media/cat.jpg"),
                    ("Body[0].__type", "TextBlock"),
                    ("Body[0].Title", "Hello"),
                ]),
            )
            .unwrap();

        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let blocks = outcome.model.blocks("Body");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].block_type, "TextBlock");
        assert_eq!(
            blocks[0].scalar_at(&["Title"]),
            Some(&ScalarValue::String("Hello".into()))
        );
        assert_eq!(blocks[1].block_type, "ImageBlock");
        assert_eq!(blocks[1].scalar_at(&["Width"]), Some(&ScalarValue::Integer(640)));
        assert_eq!(
            blocks[1].scalar_at(&["Link", "Url"]),
            Some(&ScalarValue::String("/media/cat.jpg".into()))
        );
        assert_eq!(
            blocks[1].scalar_at(&["Link", "NewWindow"]),
            Some(&ScalarValue::Boolean(false))
        );
    }

    #[test]
    fn bad_discriminators_skip_only_their_block() {
        let factory = factory();
        let binder = PolymorphicBinder::new(factory.clone());
        let outcome = binder
            .bind(
                factory.create("Start").unwrap(),
                &post(&[
                    ("Body[0].__type", "TextBlock"),
                    ("Body[1].__type", "QuoteBlock"),
                    ("Body[2].Title", "orphan"),
                    ("Body[3].__type", "TextBlock"),
                    ("Body[3].Title", "kept"),
                ]),
            )
            .unwrap();

        assert_eq!(outcome.model.blocks("Body").len(), 2);
        assert_eq!(
            outcome.errors,
            vec![
                BindingError::Block {
                    region: "Body".into(),
                    index: 1,
                    reason: BlockFailure::NotAllowed("QuoteBlock".into()),
                },
                BindingError::Block {
                    region: "Body".into(),
                    index: 2,
                    reason: BlockFailure::MissingDiscriminator,
                },
            ]
        );
    }

    #[test]
    fn field_errors_do_not_abort_the_block() {
        let factory = factory();
        let binder = PolymorphicBinder::new(factory.clone());
        let outcome = binder
            .bind(
                factory.create("Start").unwrap(),
                &post(&[
                    ("Body[0].__type", "ImageBlock"),
                    ("Body[0].Width", "wide"),
                    ("Body[0].Link.Url", "/a"),
                    ("Body[0].Colour", "red"),
                ]),
            )
            .unwrap();

        let blocks = outcome.model.blocks("Body");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].scalar_at(&["Width"]), Some(&ScalarValue::Integer(0)));
        assert_eq!(
            blocks[0].scalar_at(&["Link", "Url"]),
            Some(&ScalarValue::String("/a".into()))
        );
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors.iter().all(|e| e.index() == Some(0)));
        assert!(
            outcome
                .errors
                .iter()
                .all(|e| matches!(e, BindingError::Field { .. }))
        );
    }

    #[test]
    fn scalar_and_object_regions_patch_in_place() {
        let factory = factory();
        let binder = PolymorphicBinder::new(factory.clone());
        let mut model = factory.create("Start").unwrap();
        set_region(
            &mut model,
            "Heading",
            RegionValue::Scalar(ScalarValue::String("Old".into())),
        );

        let outcome = binder
            .bind(
                model,
                &post(&[
                    ("Intro.Title", "Say hi"),
                    ("Intro.Order", "x"),
                    ("Featured", "false"),
                    ("Featured", "on"),
                    ("_token", "abc"),
                ]),
            )
            .unwrap();

        let model = &outcome.model;
        assert_eq!(
            model.region("Heading").and_then(RegionValue::as_scalar),
            Some(&ScalarValue::String("Old".into()))
        );
        assert_eq!(
            model.region("Featured").and_then(RegionValue::as_scalar),
            Some(&ScalarValue::Boolean(true))
        );
        let intro = model.region("Intro").and_then(RegionValue::as_object).unwrap();
        assert_eq!(
            intro.scalar_at(&["Title"]),
            Some(&ScalarValue::String("Say hi".into()))
        );
        assert_eq!(intro.scalar_at(&["Order"]), Some(&ScalarValue::Integer(0)));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].region(), "Intro");
    }

    #[test]
    fn unmentioned_block_region_is_kept_and_bare_key_clears() {
        let factory = factory();
        let binder = PolymorphicBinder::new(factory.clone());
        let model = factory.create("Start").unwrap();
        let bound = binder
            .bind(model, &post(&[("Body[0].__type", "TextBlock")]))
            .unwrap()
            .model;

        let untouched = binder
            .bind(bound.clone(), &post(&[("Heading", "Hi")]))
            .unwrap()
            .model;
        assert_eq!(untouched.blocks("Body").len(), 1);

        let cleared = binder.bind(bound, &post(&[("Body", "")])).unwrap().model;
        assert!(cleared.blocks("Body").is_empty());
    }

    #[test]
    fn prefix_scopes_keys_and_reports_unknown_regions() {
        let factory = factory();
        let binder = PolymorphicBinder::new(factory.clone()).with_prefix("Regions");
        let outcome = binder
            .bind(
                factory.create("Start").unwrap(),
                &post(&[
                    ("Regions.Heading", "Hello"),
                    ("Regions.Sidebar", "?"),
                    ("Heading", "ignored"),
                ]),
            )
            .unwrap();

        assert_eq!(
            outcome.model.region("Heading").and_then(RegionValue::as_scalar),
            Some(&ScalarValue::String("Hello".into()))
        );
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].region(), "Sidebar");
    }

    #[test]
    fn flatten_binds_back_to_the_same_model() {
        let factory = factory();
        let binder = PolymorphicBinder::new(factory.clone()).with_prefix("Regions");
        let bound = binder
            .bind(
                factory.create("Start").unwrap(),
                &post(&[
                    ("Regions.Heading", "Hello"),
                    ("Regions.Intro.Order", "3"),
                    ("Regions.Body[0].__type", "ImageBlock"),
                    ("Regions.Body[0].Link.NewWindow", "true"),
                    ("Regions.Body[4].__type", "TextBlock"),
                    ("Regions.Body[4].Body", "<p>Lorem</p>"),
                ]),
            )
            .unwrap();
        assert!(bound.is_clean());

        let fields = binder.flatten(&bound.model);
        assert!(fields.contains(&("Regions.Body[1].__type".into(), "TextBlock".into())));

        let rebound = binder
            .bind(factory.create("Start").unwrap(), &fields)
            .unwrap();
        assert!(rebound.is_clean());
        assert_eq!(rebound.model.regions, bound.model.regions);
    }

    #[test]
    fn unknown_model_type_is_not_found() {
        let factory = factory();
        let binder = PolymorphicBinder::new(factory.clone());
        let mut model = factory.create("Start").unwrap();
        model.type_name = "Gone".into();
        assert_eq!(
            binder.bind(model, &[]).unwrap_err(),
            TypeError::NotFound("Gone".into())
        );
    }

    #[test]
    fn bindable_names() {
        assert!(is_bindable_name("Body"));
        assert!(is_bindable_name("_private"));
        assert!(is_bindable_name("Side-Note_2"));
        assert!(!is_bindable_name("__type"));
        assert!(!is_bindable_name("Body[0]"));
        assert!(!is_bindable_name("Main Body"));
        assert!(!is_bindable_name("2col"));
        assert!(!is_bindable_name(""));
    }
}
