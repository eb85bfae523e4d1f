//! Content model factory.
//!
//! Instantiates fully defaulted models and block instances from the active
//! registry generation.

use std::sync::Arc;

use chrono::Utc;

use super::model::{BlockInstance, ContentModel, ObjectValue, Region, RegionValue, ScalarValue};
use super::type_registry::{TypeError, TypeGeneration, TypeRegistry};
use super::types::{BlockTypeDefinition, RegionKind, TypeDefinition};

/// Creates empty content models and block instances.
#[derive(Clone)]
pub struct ContentModelFactory {
    registry: TypeRegistry,
}

impl ContentModelFactory {
    pub fn new(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Create a model for `type_name` with every region defaulted.
    pub fn create(&self, type_name: &str) -> Result<ContentModel, TypeError> {
        let definition = self.registry.resolve(type_name)?;
        Ok(model_for(&definition))
    }

    /// Create a block instance for `block_type` with every field defaulted.
    pub fn create_block(&self, block_type: &str) -> Result<BlockInstance, TypeError> {
        create_block_in(&self.registry.snapshot(), block_type)
    }

    /// The generation this factory currently creates from.
    pub fn snapshot(&self) -> Arc<TypeGeneration> {
        self.registry.snapshot()
    }
}

/// Create a block instance from a specific generation.
pub fn create_block_in(
    generation: &TypeGeneration,
    block_type: &str,
) -> Result<BlockInstance, TypeError> {
    let definition = generation.resolve_block(block_type)?;
    Ok(block_for(&definition))
}

/// Build a defaulted model from a page type definition.
pub fn model_for(definition: &TypeDefinition) -> ContentModel {
    let now = Utc::now();
    ContentModel {
        id: None,
        type_name: definition.name.clone(),
        kind: definition.kind,
        route: definition.route.clone(),
        title: String::new(),
        slug: String::new(),
        parent_id: None,
        published: None,
        meta_keywords: String::new(),
        meta_description: String::new(),
        excerpt: String::new(),
        created: now,
        last_modified: now,
        regions: definition
            .regions
            .iter()
            .map(|region| Region {
                name: region.name.clone(),
                value: default_region_value(&region.kind),
            })
            .collect(),
    }
}

/// Build a defaulted block instance from a block type definition.
pub fn block_for(definition: &BlockTypeDefinition) -> BlockInstance {
    BlockInstance {
        block_type: definition.name.clone(),
        fields: ObjectValue::default_for(&definition.fields),
    }
}

pub fn default_region_value(kind: &RegionKind) -> RegionValue {
    match kind {
        RegionKind::Scalar(k) => RegionValue::Scalar(ScalarValue::zero(*k)),
        RegionKind::Object(fields) => RegionValue::Object(ObjectValue::default_for(fields)),
        RegionKind::Blocks(_) => RegionValue::Blocks(Vec::new()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::model::FieldValue;
    use crate::content::types::{
        EntityKind, FieldDefinition, RegionDefinition, ScalarKind, TypeDefinition,
    };

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry
            .register_block(BlockTypeDefinition::new(
                "ImageBlock",
                vec![
                    FieldDefinition::scalar("Url", ScalarKind::String),
                    FieldDefinition::scalar("Width", ScalarKind::Integer),
                ],
            ))
            .unwrap();
        registry
            .register(TypeDefinition::new(
                "Start",
                EntityKind::Page,
                vec![
                    RegionDefinition::scalar("Heading", ScalarKind::String),
                    RegionDefinition::object(
                        "Intro",
                        vec![
                            FieldDefinition::scalar("Title", ScalarKind::String),
                            FieldDefinition::object(
                                "Meta",
                                vec![FieldDefinition::scalar("Date", ScalarKind::Date)],
                            ),
                        ],
                    ),
                    RegionDefinition::blocks("Slider", ["ImageBlock"]),
                ],
            ))
            .unwrap();
        registry
    }

    #[test]
    fn create_defaults_every_region() {
        let factory = ContentModelFactory::new(registry());
        let model = factory.create("Start").unwrap();

        assert_eq!(model.type_name, "Start");
        assert_eq!(model.route, "page");
        assert!(model.id.is_none());
        assert_eq!(model.regions.len(), 3);
        assert_eq!(
            model.region("Heading"),
            Some(&RegionValue::Scalar(ScalarValue::String(String::new())))
        );
        assert!(model.blocks("Slider").is_empty());

        let intro = model.region("Intro").unwrap().as_object().unwrap();
        assert!(matches!(intro.get("Title"), Some(FieldValue::Scalar(_))));
        assert_eq!(
            intro.scalar_at(&["Meta", "Date"]),
            Some(&ScalarValue::Date(None))
        );
    }

    #[test]
    fn create_unknown_type_is_not_found() {
        let factory = ContentModelFactory::new(registry());
        assert_eq!(
            factory.create("Missing").unwrap_err(),
            TypeError::NotFound("Missing".into())
        );
    }

    #[test]
    fn create_block_defaults_fields() {
        let factory = ContentModelFactory::new(registry());
        let block = factory.create_block("ImageBlock").unwrap();
        assert_eq!(block.block_type, "ImageBlock");
        assert_eq!(block.scalar_at(&["Width"]), Some(&ScalarValue::Integer(0)));
        assert!(factory.create_block("TextBlock").is_err());
    }
}
