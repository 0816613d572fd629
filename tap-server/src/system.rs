//! # TapSystem
//!
//! Owns the registry and both entity trees, and is the only place that writes
//! to them. Every write is all-or-nothing: steps are journaled as they are
//! applied and undone in reverse order when a later step fails.
//!
//! ```rust
//! use serde_json::json;
//! use tap_core::TapConfig;
//! use tap_server::TapSystem;
//!
//! let mut system = TapSystem::new(&TapConfig::new());
//! let res = system.management().send_command("post", "channels", Some(json!({"name": "C1"})));
//! let channel_id = res.data.as_str().unwrap().to_string();
//!
//! let res = system.management().send_command(
//!     "post",
//!     "customers",
//!     Some(json!({"name": "Cust1", "from": {"type": "channels", "id": channel_id}})),
//! );
//! let customer_id = res.data.as_str().unwrap();
//!
//! // a customer is indexed by both servers
//! let res = system.main().send_command("get", &format!("customers/{customer_id}"), None);
//! assert_eq!(res.status_code, 200);
//! ```

use tap_core::errors::TapError;
use tap_core::{ResourcePath, TapConfig, TapConfigSnapshot, TapResult};
use tracing::{debug, info, warn};

use crate::entity::{
    self, Channel, ChildFactory, ChildSeed, Customer, Entity, EntityId, EntityKind, EntityRef,
};
use crate::ids::{IdAllocator, IdStrategy};
use crate::payload::PAYLOAD_MESSAGE;
use crate::registry::EntityRegistry;
use crate::server::{ResourceServer, ServerKind};
use crate::tree::{EntityTree, TreeNode};

/// One applied write, recorded so it can be reverted.
#[derive(Debug)]
enum Undo {
    TreeInsert { server: ServerKind, path: Vec<String> },
    TreeRemove { server: ServerKind, path: Vec<String>, node: TreeNode },
    Register(EntityRef),
    Unregister(Entity),
}

fn inconsistent(detail: impl std::fmt::Display) -> anyhow::Error {
    TapError::conflict(format!("Inconsistent: {detail}")).into_anyhow()
}

/// `[type, id]` at the end of a path, as a registry key. Misses are 404.
pub(crate) fn target_of(path: &ResourcePath) -> TapResult<EntityRef> {
    let (kind, id) = path
        .target()
        .ok_or_else(|| TapError::not_found(format!("`{path}` does not name an entity")).into_anyhow())?;
    let kind = EntityKind::from_collection(kind)
        .ok_or_else(|| TapError::not_found(format!("`{kind}` is not an entity type")).into_anyhow())?;
    Ok(EntityRef::new(kind, id))
}

#[derive(Debug, Clone)]
pub struct TapSystem {
    registry: EntityRegistry,
    management: EntityTree,
    main: EntityTree,
    ids: IdAllocator,
    config: TapConfigSnapshot,
}

impl Default for TapSystem {
    fn default() -> Self {
        Self::new(&TapConfig::new())
    }
}

impl TapSystem {
    pub fn new(config: &TapConfig) -> Self {
        let config = config.snapshot();
        Self {
            registry: EntityRegistry::new(),
            management: EntityTree::new(ServerKind::Management.root_kind().collection()),
            main: EntityTree::new(ServerKind::Main.root_kind().collection()),
            ids: IdAllocator::new(IdStrategy::from_config(&config)),
            config,
        }
    }

    pub fn config(&self) -> &TapConfigSnapshot {
        &self.config
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn tree(&self, server: ServerKind) -> &EntityTree {
        match server {
            ServerKind::Management => &self.management,
            ServerKind::Main => &self.main,
        }
    }

    fn tree_mut(&mut self, server: ServerKind) -> &mut EntityTree {
        match server {
            ServerKind::Management => &mut self.management,
            ServerKind::Main => &mut self.main,
        }
    }

    pub fn server(&mut self, kind: ServerKind) -> ResourceServer<'_> {
        ResourceServer::new(kind, self)
    }

    /// Channels and their customers.
    pub fn management(&mut self) -> ResourceServer<'_> {
        self.server(ServerKind::Management)
    }

    /// Customers, users and access tokens.
    pub fn main(&mut self) -> ResourceServer<'_> {
        self.server(ServerKind::Main)
    }

    pub fn entity(&self, target: &EntityRef) -> Option<&Entity> {
        self.registry.get(target)
    }

    fn allocate_id(&mut self, kind: EntityKind) -> EntityId {
        let registry = &self.registry;
        self.ids.allocate(kind, |id| registry.contains_id(kind, id))
    }

    pub fn create_channel(&mut self, name: &str) -> TapResult<EntityId> {
        let id = self.allocate_id(EntityKind::Channel);
        self.create_channel_with_id(&id, name)
    }

    /// Fixed ids are handy for fixtures. The id must be a single non-empty
    /// path segment (422) and not taken (409).
    pub fn create_channel_with_id(&mut self, id: &str, name: &str) -> TapResult<EntityId> {
        if id.is_empty() {
            return Err(tap_schema::field_error(PAYLOAD_MESSAGE, "id", "must not be empty"));
        }
        if id.contains('/') {
            return Err(tap_schema::field_error(PAYLOAD_MESSAGE, "id", "must not contain `/`"));
        }
        let name = entity::required_name(Some(name.to_string()))?;
        let id = self.register(Channel::new(id, name).into())?;
        info!(channel = %id, "channel created");
        Ok(id)
    }

    /// Build a child through the parent's [`ChildFactory`] and index it in the
    /// registry and in every tree that tracks its kind.
    pub fn create_child(&mut self, parent: &EntityRef, name: Option<&str>) -> TapResult<EntityId> {
        let parent_entity = self.registry.require(parent)?.clone();
        let sibling_count = self.registry.children_of(parent).len();
        // terminal parents reject the seed, so they never consume an id
        let id = match parent_entity.child_kind() {
            Some(kind) => self.allocate_id(kind),
            None => EntityId::new(),
        };

        let child = parent_entity.create_child(ChildSeed {
            id,
            name: name.map(str::to_string),
            sibling_count,
        })?;
        let child_ref = child.entity_ref();
        let id = self.register(child)?;
        info!(parent = %parent, child = %child_ref, "entity created");
        Ok(id)
    }

    fn register(&mut self, entity: Entity) -> TapResult<EntityId> {
        let mut undo = Vec::new();
        if let Err(err) = self.try_register(&entity, &mut undo) {
            self.rollback(undo);
            return Err(err);
        }
        Ok(entity.id().to_string())
    }

    fn try_register(&mut self, entity: &Entity, undo: &mut Vec<Undo>) -> TapResult<()> {
        self.registry.insert(entity.clone())?;
        undo.push(Undo::Register(entity.entity_ref()));

        for server in ServerKind::ALL {
            let Some(path) = entity.tree_path(server) else {
                continue;
            };
            if let Some((key, parent)) = path.split_last() {
                self.tree_mut(server).insert(parent, key, entity.tree_node(server))?;
            }
            undo.push(Undo::TreeInsert { server, path });
        }
        Ok(())
    }

    pub fn rename(&mut self, target: &EntityRef, name: &str) -> TapResult<()> {
        let name = entity::non_empty(name.to_string())?;
        let entity = self
            .registry
            .get_mut(target)
            .ok_or_else(|| TapError::not_found(format!("{target} is not registered")).into_anyhow())?;
        entity.set_name(name);
        debug!(target = %target, "entity renamed");
        Ok(())
    }

    /// Remove `target` and everything below it from the registry and from
    /// every tree. Returns the removed entities, parents first.
    pub fn delete(&mut self, target: &EntityRef) -> TapResult<Vec<EntityRef>> {
        let entity = self.registry.require(target)?;
        for server in ServerKind::ALL {
            if let Some(path) = entity.tree_path(server) {
                if !self.tree(server).contains(path.as_slice()) {
                    return Err(inconsistent(format!("{target} is registered but missing from the {server} tree")));
                }
            }
        }

        let doomed = self.registry.subtree(target);
        let mut undo = Vec::new();
        if let Err(err) = self.try_unregister(&doomed, &mut undo) {
            self.rollback(undo);
            return Err(err);
        }
        info!(target = %target, removed = doomed.len(), "entity deleted");
        Ok(doomed)
    }

    fn try_unregister(&mut self, doomed: &[EntityRef], undo: &mut Vec<Undo>) -> TapResult<()> {
        for target in doomed {
            let entity = self
                .registry
                .remove(target)
                .ok_or_else(|| TapError::not_found(format!("{target} is not registered")).into_anyhow())?;
            undo.push(Undo::Unregister(entity.clone()));

            for server in ServerKind::ALL {
                let Some(path) = entity.tree_path(server) else {
                    continue;
                };
                // already detached together with an ancestor
                if !self.tree(server).contains(path.as_slice()) {
                    continue;
                }
                if let Some((key, parent)) = path.split_last() {
                    let node = self.tree_mut(server).remove(parent, key)?;
                    undo.push(Undo::TreeRemove { server, path, node });
                }
            }
        }
        Ok(())
    }

    /// DELETE as routed by a server: the tree walk and the registry key must
    /// agree on the entity before anything is removed.
    pub(crate) fn delete_at(&mut self, server: ServerKind, path: &ResourcePath) -> TapResult<Vec<EntityRef>> {
        if path.len() < 2 {
            tap_core::bail_tap!(not_found, "`{}` does not name an entity", path);
        }
        let id = path.last().unwrap_or_default();
        let parent_node = self.tree(server).resolve(path.parent())?;
        if !parent_node.contains(id) {
            return Err(TapError::not_found(format!("`{id}` is not under `{}`", path.parent().join("/"))).into_anyhow());
        }

        let target = target_of(path)?;
        let Some(entity) = self.registry.get(&target) else {
            return Err(inconsistent(format!("{target} is in the {server} tree but not registered")));
        };
        if entity.tree_path(server).as_deref() != Some(path.segments()) {
            return Err(inconsistent(format!("`{path}` does not lead to {target}")));
        }
        self.delete(&target)
    }

    fn rollback(&mut self, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            debug!(step = ?step, "rolling back");
            let result = match step {
                Undo::TreeInsert { server, path } => match path.split_last() {
                    Some((key, parent)) => self.tree_mut(server).remove(parent, key).map(|_| ()),
                    None => Ok(()),
                },
                Undo::TreeRemove { server, path, node } => match path.split_last() {
                    Some((key, parent)) => self.tree_mut(server).insert(parent, key, node),
                    None => Ok(()),
                },
                Undo::Register(target) => {
                    self.registry.remove(&target);
                    Ok(())
                }
                Undo::Unregister(entity) => self.registry.insert(entity),
            };
            if let Err(err) = result {
                warn!(error = %err, "rollback step failed");
            }
        }
    }

    /// Child ids of `parent`, read from the tree that indexes the relation.
    pub fn children(&self, parent: &EntityRef) -> TapResult<Vec<EntityId>> {
        let entity = self.registry.require(parent)?;
        let Some(child) = entity.child_kind() else {
            return Ok(Vec::new());
        };
        let server = ServerKind::ALL
            .into_iter()
            .find(|s| s.indexes(entity.kind()) && s.indexes(child));
        let Some(path) = server.and_then(|s| entity.children_path(s).map(|p| (s, p))) else {
            return Ok(Vec::new());
        };
        let node = self.tree(path.0).resolve(path.1.as_slice())?;
        Ok(node.keys().map(str::to_string).collect())
    }

    fn customer_mut(&mut self, customer_id: &str) -> TapResult<&mut Customer> {
        self.registry
            .get_mut(&EntityRef::customer(customer_id))
            .and_then(Entity::as_customer_mut)
            .ok_or_else(|| TapError::not_found(format!("customer {customer_id} is not registered")).into_anyhow())
    }

    pub fn bump_customer_version(&mut self, customer_id: &str) -> TapResult<u32> {
        let customer = self.customer_mut(customer_id)?;
        customer.version += 1;
        Ok(customer.version)
    }

    /// Versions never drop below 1.
    pub fn downgrade_customer_version(&mut self, customer_id: &str) -> TapResult<u32> {
        let customer = self.customer_mut(customer_id)?;
        if customer.version <= 1 {
            tap_core::bail_tap!(conflict, "customer {} is already at version 1", customer_id);
        }
        customer.version -= 1;
        Ok(customer.version)
    }

    /// Audit the tree/registry invariant both ways: every id in a tree is
    /// registered at that exact place, and every registered entity is in
    /// every tree that indexes its kind.
    pub fn check_consistency(&self) -> TapResult<()> {
        for server in ServerKind::ALL {
            let tree = self.tree(server);
            let root = server.root_kind();
            let mut pending = vec![(vec![root.collection().to_string()], root)];

            while let Some((collection_path, kind)) = pending.pop() {
                let collection = tree.resolve(collection_path.as_slice())?;
                for (id, node) in collection.iter() {
                    let target = EntityRef::new(kind, id);
                    let mut path = collection_path.clone();
                    path.push(id.to_string());

                    let Some(entity) = self.registry.get(&target) else {
                        return Err(inconsistent(format!("{target} is in the {server} tree but not registered")));
                    };
                    if entity.tree_path(server).as_ref() != Some(&path) {
                        return Err(inconsistent(format!("{target} is misplaced in the {server} tree")));
                    }
                    if let Some(child) = kind.child().filter(|c| server.indexes(*c)) {
                        if !node.contains(child.collection()) {
                            return Err(inconsistent(format!("{target} has no {child} collection in the {server} tree")));
                        }
                        path.push(child.collection().to_string());
                        pending.push((path, child));
                    }
                }
            }

            for kind in EntityKind::ALL.into_iter().filter(|k| server.indexes(*k)) {
                for entity in self.registry.iter(kind) {
                    if let Some(path) = entity.tree_path(server) {
                        if !tree.contains(path.as_slice()) {
                            return Err(inconsistent(format!(
                                "{} is registered but missing from the {server} tree",
                                entity.entity_ref()
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential() -> TapSystem {
        TapSystem::new(&TapConfig::new().with(tap_core::keys::IDS_STRATEGY, "sequential"))
    }

    #[test]
    fn customer_creation_updates_both_trees() {
        let mut system = sequential();
        let channel = system.create_channel("Channel 1").unwrap();
        let customer = system.create_child(&EntityRef::channel(&channel), Some("Customer 1")).unwrap();

        assert_eq!(customer, "customer-1");
        assert!(system.tree(ServerKind::Management).contains(&["channels", "channel-1", "customers", "customer-1"]));
        assert!(system.tree(ServerKind::Main).contains(&["customers", "customer-1", "users"]));
        assert_eq!(system.children(&EntityRef::channel(&channel)).unwrap(), vec![customer]);
        system.check_consistency().unwrap();
    }

    #[test]
    fn failed_registration_rolls_back_earlier_writes() {
        let mut system = sequential();
        system.create_channel_with_id("ch1", "Channel 1").unwrap();
        // occupy the main-tree slot the next customer will want
        system.main.insert(&["customers"], "customer-1", TreeNode::leaf()).unwrap();
        let before = (system.registry.clone(), system.management.clone());

        let err = system.create_child(&EntityRef::channel("ch1"), Some("Customer 1")).unwrap_err();
        assert_eq!(TapError::from_anyhow(&err).unwrap().code(), 409);
        assert_eq!(system.registry, before.0);
        assert_eq!(system.management, before.1);
    }

    #[test]
    fn deleting_a_channel_cascades_into_the_main_tree() {
        let mut system = sequential();
        let channel = EntityRef::channel(system.create_channel("Channel 1").unwrap());
        let customer = EntityRef::customer(system.create_child(&channel, Some("Customer 1")).unwrap());
        let user = EntityRef::user(system.create_child(&customer, Some("User1")).unwrap());
        system.create_child(&user, None).unwrap();

        let removed = system.delete(&channel).unwrap();
        assert_eq!(removed.len(), 4);
        assert!(system.registry.is_empty());
        assert!(system.tree(ServerKind::Main).resolve(&["customers"]).unwrap().is_empty());
        system.check_consistency().unwrap();
    }

    #[test]
    fn delete_refuses_a_half_indexed_entity() {
        let mut system = sequential();
        let channel = EntityRef::channel(system.create_channel("Channel 1").unwrap());
        let customer = EntityRef::customer(system.create_child(&channel, Some("Customer 1")).unwrap());
        system.main.remove(&["customers"], &customer.id).unwrap();
        let before = system.clone();

        let err = system.delete(&customer).unwrap_err();
        assert_eq!(TapError::from_anyhow(&err).unwrap().code(), 409);
        assert_eq!(system.registry, before.registry);
        assert_eq!(system.management, before.management);
        assert!(system.check_consistency().is_err());
    }

    #[test]
    fn customer_versions_move_but_never_below_one() {
        let mut system = sequential();
        let channel = EntityRef::channel(system.create_channel("Channel 1").unwrap());
        let customer = system.create_child(&channel, Some("Customer 1")).unwrap();

        assert_eq!(system.bump_customer_version(&customer).unwrap(), 2);
        assert_eq!(system.downgrade_customer_version(&customer).unwrap(), 1);
        assert!(system.downgrade_customer_version(&customer).is_err());
        assert!(system.bump_customer_version("missing").is_err());
    }

    #[test]
    fn unnamed_tokens_are_numbered_per_user() {
        let mut system = sequential();
        let channel = EntityRef::channel(system.create_channel("Channel 1").unwrap());
        let customer = EntityRef::customer(system.create_child(&channel, Some("Customer 1")).unwrap());
        let user = EntityRef::user(system.create_child(&customer, Some("User1")).unwrap());

        let first = system.create_child(&user, None).unwrap();
        let second = system.create_child(&user, None).unwrap();
        assert_eq!(system.entity(&EntityRef::access_token(&first)).unwrap().name(), "Token 1");
        assert_eq!(system.entity(&EntityRef::access_token(&second)).unwrap().name(), "Token 2");
        assert_eq!(system.children(&user).unwrap().len(), 2);
    }

    #[test]
    fn duplicate_channel_ids_conflict() {
        let mut system = sequential();
        system.create_channel_with_id("channel1", "Channel 1").unwrap();
        let err = system.create_channel_with_id("channel1", "Channel 1").unwrap_err();
        assert_eq!(TapError::from_anyhow(&err).unwrap().code(), 409);
        system.check_consistency().unwrap();
    }
}
