//! The two resource servers. Both are views over one [`TapSystem`]; they
//! differ only in which tree they read and walk.

use std::fmt;

use serde_json::Value;
use tap_core::errors::TapError;
use tap_core::{keys, ResourcePath, ResourceService, Response, ServiceCapabilities, TapResult};
use tracing::debug;

use crate::entity::{self, ChildFactory, Entity, EntityKind};
use crate::payload::{CreatePayload, RenamePayload, PAYLOAD_MESSAGE};
use crate::system::{target_of, TapSystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerKind {
    /// Channels and the customers they own.
    Management,
    /// Customers, their users and the users' access tokens.
    Main,
}

impl ServerKind {
    pub const ALL: [ServerKind; 2] = [ServerKind::Management, ServerKind::Main];

    pub fn name(&self) -> &'static str {
        match self {
            ServerKind::Management => "management",
            ServerKind::Main => "main",
        }
    }

    /// Kind stored in the tree's single root collection.
    pub fn root_kind(&self) -> EntityKind {
        match self {
            ServerKind::Management => EntityKind::Channel,
            ServerKind::Main => EntityKind::Customer,
        }
    }

    pub fn indexes(&self, kind: EntityKind) -> bool {
        match self {
            ServerKind::Management => matches!(kind, EntityKind::Channel | EntityKind::Customer),
            ServerKind::Main => matches!(kind, EntityKind::Customer | EntityKind::User | EntityKind::AccessToken),
        }
    }

    fn methods_key(&self) -> &'static str {
        match self {
            ServerKind::Management => keys::MANAGEMENT_METHODS,
            ServerKind::Main => keys::MAIN_METHODS,
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A server bound to the system for the duration of a borrow.
pub struct ResourceServer<'a> {
    kind: ServerKind,
    system: &'a mut TapSystem,
}

impl<'a> ResourceServer<'a> {
    pub(crate) fn new(kind: ServerKind, system: &'a mut TapSystem) -> Self {
        Self { kind, system }
    }

    /// Handle one request. Never panics and never returns an error; every
    /// outcome is a `{statusCode, data}` envelope.
    pub fn send_command(&mut self, request: &str, path: &str, data: Option<Value>) -> Response {
        tap_core::send_command(self, request, path, data)
    }

    fn enforce_parent_path(&self) -> bool {
        self.system
            .config()
            .get_bool(keys::ENFORCE_PARENT_PATH)
            .unwrap_or(true)
    }

    /// A POST path names where the child will live: either the bare child
    /// collection or the parent's full children path in this tree.
    fn check_parent_path(&self, path: &ResourcePath, parent: &Entity) -> TapResult<()> {
        let Some(child) = parent.child_kind() else {
            return Ok(());
        };
        let segments = path.segments();
        if segments.len() == 1 && segments[0] == child.collection() {
            return Ok(());
        }
        if parent.children_path(self.kind).as_deref() == Some(segments) {
            return Ok(());
        }
        Err(TapError::conflict(format!(
            "`{path}` is not where children of {} live",
            parent.entity_ref()
        ))
        .into_anyhow())
    }

    fn create_root(&mut self, path: &ResourcePath, name: Option<String>) -> TapResult<String> {
        let root = self.kind.root_kind();
        if root.parent().is_some() || path.segments() != [root.collection()] {
            return Err(tap_schema::field_error(PAYLOAD_MESSAGE, "from", "is required"));
        }
        let name = entity::required_name(name)?;
        self.system.create_channel(&name)
    }
}

impl ResourceService for ResourceServer<'_> {
    fn capabilities(&self) -> ServiceCapabilities {
        match self.system.config().get_list(self.kind.methods_key()) {
            Some(names) => ServiceCapabilities::from_names(names),
            None => ServiceCapabilities::standard_crud(),
        }
    }

    fn get(&self, path: &ResourcePath) -> TapResult<Value> {
        self.system.tree(self.kind).snapshot(path.segments())
    }

    fn create(&mut self, path: &ResourcePath, data: Value) -> TapResult<Value> {
        let payload: CreatePayload = tap_schema::validate(&data, PAYLOAD_MESSAGE)?;

        let id = match payload.from {
            Some(parent) => {
                let parent_entity = self.system.registry().require(&parent)?;
                if self.enforce_parent_path() {
                    self.check_parent_path(path, parent_entity)?;
                }
                self.system.create_child(&parent, payload.name.as_deref())?
            }
            None => self.create_root(path, payload.name)?,
        };
        debug!(server = %self.kind, path = %path, id = %id, "created");
        Ok(Value::String(id))
    }

    fn update(&mut self, path: &ResourcePath, data: Value) -> TapResult<()> {
        self.system.tree(self.kind).resolve(path.segments())?;
        let target = target_of(path)?;
        let payload: RenamePayload = tap_schema::validate(&data, PAYLOAD_MESSAGE)?;
        self.system.rename(&target, &payload.name)
    }

    fn remove(&mut self, path: &ResourcePath) -> TapResult<()> {
        self.system.delete_at(self.kind, path)?;
        Ok(())
    }
}
