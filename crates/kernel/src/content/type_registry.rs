//! Type registry.
//!
//! Holds the active generation of page type and block type definitions.
//! Readers take a snapshot (`Arc<TypeGeneration>`) and keep using it for the
//! duration of an operation; a rebuild swaps in a complete new generation, so
//! a reader never observes a mix of old and new definitions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use super::types::{BlockTypeDefinition, RegionDefinition, TypeDefinition};

/// Registry lookup and registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("page type '{0}' is already registered")]
    DuplicateType(String),

    #[error("block type '{0}' is already registered")]
    DuplicateBlockType(String),

    #[error("page type '{0}' not found")]
    NotFound(String),

    #[error("block type '{0}' not found")]
    BlockNotFound(String),

    #[error("page type '{page_type}': region '{region}' references unknown block type '{block_type}'")]
    UnknownBlockType {
        page_type: String,
        region: String,
        block_type: String,
    },
}

/// One complete, self-consistent set of definitions.
#[derive(Debug, Default)]
pub struct TypeGeneration {
    id: u64,
    types: HashMap<String, Arc<TypeDefinition>>,
    type_order: Vec<String>,
    block_types: HashMap<String, Arc<BlockTypeDefinition>>,
    block_order: Vec<String>,
}

impl TypeGeneration {
    /// Generation number; 0 is the empty generation a registry starts with.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<TypeDefinition>, TypeError> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| TypeError::NotFound(name.to_string()))
    }

    pub fn resolve_block(&self, name: &str) -> Result<Arc<BlockTypeDefinition>, TypeError> {
        self.block_types
            .get(name)
            .cloned()
            .ok_or_else(|| TypeError::BlockNotFound(name.to_string()))
    }

    /// Block definitions a block region accepts, in allowed-list order.
    ///
    /// Empty for scalar and object regions.
    pub fn all_block_types_for(
        &self,
        region: &RegionDefinition,
    ) -> Result<Vec<Arc<BlockTypeDefinition>>, TypeError> {
        region
            .allowed_blocks()
            .unwrap_or_default()
            .iter()
            .map(|name| self.resolve_block(name))
            .collect()
    }

    /// Page types in registration order.
    pub fn types(&self) -> Vec<Arc<TypeDefinition>> {
        self.type_order
            .iter()
            .filter_map(|name| self.types.get(name).cloned())
            .collect()
    }

    /// Block types in registration order.
    pub fn block_types(&self) -> Vec<Arc<BlockTypeDefinition>> {
        self.block_order
            .iter()
            .filter_map(|name| self.block_types.get(name).cloned())
            .collect()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn block_type_count(&self) -> usize {
        self.block_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.block_types.is_empty()
    }
}

/// Append-only collector for one build pass.
///
/// Nothing registered here is visible to readers until the finished
/// generation is handed to [`TypeRegistry::replace_all`].
#[derive(Debug, Default)]
pub struct GenerationBuilder {
    generation: TypeGeneration,
}

impl GenerationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing generation's definitions.
    fn from_generation(source: &TypeGeneration) -> Self {
        Self {
            generation: TypeGeneration {
                id: 0,
                types: source.types.clone(),
                type_order: source.type_order.clone(),
                block_types: source.block_types.clone(),
                block_order: source.block_order.clone(),
            },
        }
    }

    /// Add a page type. Every block type its regions allow must already be
    /// in this generation.
    pub fn register(&mut self, definition: TypeDefinition) -> Result<(), TypeError> {
        if self.generation.types.contains_key(&definition.name) {
            return Err(TypeError::DuplicateType(definition.name));
        }
        for region in &definition.regions {
            let allowed = region.allowed_blocks().unwrap_or_default();
            if let Some(missing) = allowed.iter().find(|b| !self.contains_block(b)) {
                return Err(TypeError::UnknownBlockType {
                    page_type: definition.name.clone(),
                    region: region.name.clone(),
                    block_type: missing.clone(),
                });
            }
        }
        self.generation.type_order.push(definition.name.clone());
        self.generation
            .types
            .insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn register_block(&mut self, definition: BlockTypeDefinition) -> Result<(), TypeError> {
        if self.generation.block_types.contains_key(&definition.name) {
            return Err(TypeError::DuplicateBlockType(definition.name));
        }
        self.generation.block_order.push(definition.name.clone());
        self.generation
            .block_types
            .insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn contains_block(&self, name: &str) -> bool {
        self.generation.block_types.contains_key(name)
    }

    pub fn finish(self) -> TypeGeneration {
        self.generation
    }
}

/// Registry of page types and block types.
///
/// Cloning is cheap; clones share the same active generation.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    inner: Arc<TypeRegistryInner>,
}

#[derive(Default)]
struct TypeRegistryInner {
    current: RwLock<Arc<TypeGeneration>>,
    next_id: AtomicU64,
}

impl TypeRegistry {
    /// Create a registry holding the empty generation.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active generation.
    pub fn snapshot(&self) -> Arc<TypeGeneration> {
        self.inner.current.read().clone()
    }

    /// Atomically replace every definition with `generation`.
    ///
    /// Returns the id assigned to the new generation.
    pub fn replace_all(&self, mut generation: TypeGeneration) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        generation.id = id;
        let (types, blocks) = (generation.type_count(), generation.block_type_count());
        *self.inner.current.write() = Arc::new(generation);
        info!(
            generation = id,
            page_types = types,
            block_types = blocks,
            "type registry generation activated"
        );
        id
    }

    /// Register one page type into the active generation.
    ///
    /// Copy-on-write: readers holding the previous snapshot are unaffected.
    pub fn register(&self, definition: TypeDefinition) -> Result<(), TypeError> {
        let mut current = self.inner.current.write();
        let mut builder = GenerationBuilder::from_generation(&current);
        let name = definition.name.clone();
        builder.register(definition)?;
        *current = Arc::new(self.stamp(builder.finish()));
        debug!(type_name = %name, generation = current.id, "registered page type");
        Ok(())
    }

    /// Register one block type into the active generation.
    pub fn register_block(&self, definition: BlockTypeDefinition) -> Result<(), TypeError> {
        let mut current = self.inner.current.write();
        let mut builder = GenerationBuilder::from_generation(&current);
        let name = definition.name.clone();
        builder.register_block(definition)?;
        *current = Arc::new(self.stamp(builder.finish()));
        debug!(block_type = %name, generation = current.id, "registered block type");
        Ok(())
    }

    fn stamp(&self, mut generation: TypeGeneration) -> TypeGeneration {
        generation.id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        generation
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<TypeDefinition>, TypeError> {
        self.snapshot().resolve(name)
    }

    pub fn resolve_block(&self, name: &str) -> Result<Arc<BlockTypeDefinition>, TypeError> {
        self.snapshot().resolve_block(name)
    }

    pub fn all_block_types_for(
        &self,
        region: &RegionDefinition,
    ) -> Result<Vec<Arc<BlockTypeDefinition>>, TypeError> {
        self.snapshot().all_block_types_for(region)
    }

    /// Id of the active generation.
    pub fn generation(&self) -> u64 {
        self.snapshot().id()
    }
}
