use std::collections::{BTreeMap, HashMap};

use tap_core::errors::TapError;
use tap_core::TapResult;

use crate::entity::{Entity, EntityId, EntityKind, EntityRef};

/// Canonical store of live entities, partitioned by kind.
///
/// Trees only index ids; everything else about an entity lives here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRegistry {
    entities: HashMap<EntityKind, BTreeMap<EntityId, Entity>>,
}

impl EntityRegistry {
    /// Create an empty registry with one partition per kind.
    pub fn new() -> Self {
        Self {
            entities: EntityKind::ALL
                .into_iter()
                .map(|kind| (kind, BTreeMap::new()))
                .collect(),
        }
    }

    fn partition(&self, kind: EntityKind) -> Option<&BTreeMap<EntityId, Entity>> {
        self.entities.get(&kind)
    }

    /// Register an entity. Ids are unique per kind.
    pub fn insert(&mut self, entity: Entity) -> TapResult<()> {
        let partition = self.entities.entry(entity.kind()).or_default();
        if partition.contains_key(entity.id()) {
            return Err(TapError::conflict(format!("{} is already registered", entity.entity_ref())).into_anyhow());
        }
        partition.insert(entity.id().to_string(), entity);
        Ok(())
    }

    pub fn get(&self, target: &EntityRef) -> Option<&Entity> {
        self.partition(target.kind)?.get(&target.id)
    }

    pub fn get_mut(&mut self, target: &EntityRef) -> Option<&mut Entity> {
        self.entities.get_mut(&target.kind)?.get_mut(&target.id)
    }

    /// Like `get`, but a miss is a 404.
    pub fn require(&self, target: &EntityRef) -> TapResult<&Entity> {
        self.get(target)
            .ok_or_else(|| TapError::not_found(format!("{target} is not registered")).into_anyhow())
    }

    pub fn contains_id(&self, kind: EntityKind, id: &str) -> bool {
        self.partition(kind).is_some_and(|p| p.contains_key(id))
    }

    pub fn remove(&mut self, target: &EntityRef) -> Option<Entity> {
        self.entities.get_mut(&target.kind)?.remove(&target.id)
    }

    pub fn iter(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.partition(kind).into_iter().flat_map(|p| p.values())
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.partition(kind).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.values().all(BTreeMap::is_empty)
    }

    /// Direct children of `parent`, found through their parent links.
    pub fn children_of(&self, parent: &EntityRef) -> Vec<EntityRef> {
        let Some(kind) = parent.kind.child() else {
            return Vec::new();
        };
        self.iter(kind)
            .filter(|e| e.parent().as_ref() == Some(parent))
            .map(Entity::entity_ref)
            .collect()
    }

    /// `root` followed by all its descendants, parents before children.
    pub fn subtree(&self, root: &EntityRef) -> Vec<EntityRef> {
        let mut out = vec![root.clone()];
        let mut cursor = 0;
        while cursor < out.len() {
            let children = self.children_of(&out[cursor]);
            out.extend(children);
            cursor += 1;
        }
        out
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
