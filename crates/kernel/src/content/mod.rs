//! Content type system.
//!
//! This module provides:
//! - Type definitions for page types, block types and their regions
//! - TypeRegistry: generations of definitions swapped atomically
//! - TypeBuilder: declarative JSON/YAML sources into a registry generation
//! - ContentModelFactory: defaulted models and block instances
//! - PolymorphicBinder: flattened form posts into models
//! - ContentService: save/delete/bind orchestration

pub mod binder;
pub mod builder;
pub mod factory;
pub mod model;
mod service;
pub mod type_registry;
pub mod types;

pub use binder::{BindOutcome, BindingError, BlockFailure, DISCRIMINATOR, FieldSet, PolymorphicBinder};
pub use builder::{BuildError, BuildReport, StructuralError, TypeBuilder};
pub use factory::ContentModelFactory;
pub use model::{
    BlockInstance, ContentModel, FieldValue, ObjectValue, Region, RegionValue, ScalarValue,
};
pub use service::{
    BoundContent, ContentError, ContentService, SavedContent, bind_metadata, meta_keys,
    metadata_fields,
};
pub use type_registry::{GenerationBuilder, TypeError, TypeGeneration, TypeRegistry};
pub use types::{
    BlockTypeDefinition, EntityKind, FieldDefinition, FieldKind, RegionDefinition, RegionKind,
    ScalarKind, TypeDefinition,
};
