//! Domain objects: channels own customers, customers own users, users own
//! access tokens. Only the parent creates a child, through [`ChildFactory`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tap_core::TapResult;

use crate::payload::PAYLOAD_MESSAGE;
use crate::server::ServerKind;
use crate::tree::TreeNode;

pub type EntityId = String;

/// Entity type. The serde name doubles as the collection segment in paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "channels")]
    Channel,
    #[serde(rename = "customers")]
    Customer,
    #[serde(rename = "users")]
    User,
    #[serde(rename = "accessTokens")]
    AccessToken,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Channel,
        EntityKind::Customer,
        EntityKind::User,
        EntityKind::AccessToken,
    ];

    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Channel => "channels",
            EntityKind::Customer => "customers",
            EntityKind::User => "users",
            EntityKind::AccessToken => "accessTokens",
        }
    }

    pub fn from_collection(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.collection() == segment)
    }

    /// Used as the prefix of sequential ids.
    pub fn singular(&self) -> &'static str {
        match self {
            EntityKind::Channel => "channel",
            EntityKind::Customer => "customer",
            EntityKind::User => "user",
            EntityKind::AccessToken => "token",
        }
    }

    pub fn child(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Channel => Some(EntityKind::Customer),
            EntityKind::Customer => Some(EntityKind::User),
            EntityKind::User => Some(EntityKind::AccessToken),
            EntityKind::AccessToken => None,
        }
    }

    pub fn parent(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Channel => None,
            EntityKind::Customer => Some(EntityKind::Channel),
            EntityKind::User => Some(EntityKind::Customer),
            EntityKind::AccessToken => Some(EntityKind::User),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// `{"type": "customers", "id": "..."}` in payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn channel(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::Channel, id)
    }

    pub fn customer(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::Customer, id)
    }

    pub fn user(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::User, id)
    }

    pub fn access_token(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::AccessToken, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: EntityId,
    pub name: String,
}

impl Channel {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: EntityId,
    pub name: String,
    pub channel_id: EntityId,
    /// Starts at 1.
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: EntityId,
    pub name: String,
    pub customer_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub id: EntityId,
    pub name: String,
    pub customer_id: EntityId,
    pub user_id: EntityId,
}

/// What the coordinator decides about a new child before the parent builds it.
#[derive(Debug, Clone)]
pub struct ChildSeed {
    pub id: EntityId,
    pub name: Option<String>,
    /// Children the parent already has.
    pub sibling_count: usize,
}

/// Child creation, one implementation per entity kind.
///
/// Building a child is pure; inserting it into the registry and the trees is
/// the coordinator's job.
pub trait ChildFactory {
    fn child_kind(&self) -> Option<EntityKind>;

    fn create_child(&self, seed: ChildSeed) -> TapResult<Entity>;
}

pub(crate) fn required_name(name: Option<String>) -> TapResult<String> {
    match name {
        Some(name) => non_empty(name),
        None => Err(tap_schema::field_error(PAYLOAD_MESSAGE, "name", "is required")),
    }
}

pub(crate) fn non_empty(name: String) -> TapResult<String> {
    if name.trim().is_empty() {
        return Err(tap_schema::field_error(PAYLOAD_MESSAGE, "name", "must not be empty"));
    }
    Ok(name)
}

impl ChildFactory for Channel {
    fn child_kind(&self) -> Option<EntityKind> {
        Some(EntityKind::Customer)
    }

    fn create_child(&self, seed: ChildSeed) -> TapResult<Entity> {
        Ok(Entity::Customer(Customer {
            id: seed.id,
            name: required_name(seed.name)?,
            channel_id: self.id.clone(),
            version: 1,
        }))
    }
}

impl ChildFactory for Customer {
    fn child_kind(&self) -> Option<EntityKind> {
        Some(EntityKind::User)
    }

    fn create_child(&self, seed: ChildSeed) -> TapResult<Entity> {
        Ok(Entity::User(User {
            id: seed.id,
            name: required_name(seed.name)?,
            customer_id: self.id.clone(),
        }))
    }
}

impl ChildFactory for User {
    fn child_kind(&self) -> Option<EntityKind> {
        Some(EntityKind::AccessToken)
    }

    /// Unnamed tokens are numbered per user: "Token 1", "Token 2", ...
    fn create_child(&self, seed: ChildSeed) -> TapResult<Entity> {
        let name = match seed.name {
            Some(name) => non_empty(name)?,
            None => format!("Token {}", seed.sibling_count + 1),
        };
        Ok(Entity::AccessToken(AccessToken {
            id: seed.id,
            name,
            customer_id: self.customer_id.clone(),
            user_id: self.id.clone(),
        }))
    }
}

impl ChildFactory for AccessToken {
    fn child_kind(&self) -> Option<EntityKind> {
        None
    }

    fn create_child(&self, _seed: ChildSeed) -> TapResult<Entity> {
        Err(tap_schema::field_error(PAYLOAD_MESSAGE, "from", "accessTokens cannot have children"))
    }
}

/// Any live domain object, as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Channel(Channel),
    Customer(Customer),
    User(User),
    AccessToken(AccessToken),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Channel(_) => EntityKind::Channel,
            Entity::Customer(_) => EntityKind::Customer,
            Entity::User(_) => EntityKind::User,
            Entity::AccessToken(_) => EntityKind::AccessToken,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Channel(e) => &e.id,
            Entity::Customer(e) => &e.id,
            Entity::User(e) => &e.id,
            Entity::AccessToken(e) => &e.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Channel(e) => &e.name,
            Entity::Customer(e) => &e.name,
            Entity::User(e) => &e.name,
            Entity::AccessToken(e) => &e.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            Entity::Channel(e) => e.name = name,
            Entity::Customer(e) => e.name = name,
            Entity::User(e) => e.name = name,
            Entity::AccessToken(e) => e.name = name,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind(), self.id())
    }

    pub fn parent(&self) -> Option<EntityRef> {
        match self {
            Entity::Channel(_) => None,
            Entity::Customer(e) => Some(EntityRef::channel(&e.channel_id)),
            Entity::User(e) => Some(EntityRef::customer(&e.customer_id)),
            Entity::AccessToken(e) => Some(EntityRef::user(&e.user_id)),
        }
    }

    /// Canonical location of this entity in a server's tree, `None` when that
    /// tree does not index its kind.
    pub fn tree_path(&self, server: ServerKind) -> Option<Vec<String>> {
        let segments: Vec<&str> = match (server, self) {
            (ServerKind::Management, Entity::Channel(e)) => vec!["channels", e.id.as_str()],
            (ServerKind::Management, Entity::Customer(e)) => {
                vec!["channels", e.channel_id.as_str(), "customers", e.id.as_str()]
            }
            (ServerKind::Main, Entity::Customer(e)) => vec!["customers", e.id.as_str()],
            (ServerKind::Main, Entity::User(e)) => {
                vec!["customers", e.customer_id.as_str(), "users", e.id.as_str()]
            }
            (ServerKind::Main, Entity::AccessToken(e)) => vec![
                "customers",
                e.customer_id.as_str(),
                "users",
                e.user_id.as_str(),
                "accessTokens",
                e.id.as_str(),
            ],
            _ => return None,
        };
        Some(segments.into_iter().map(str::to_string).collect())
    }

    /// Where this entity's children live in a server's tree.
    ///
    /// Children of a parent the tree does not index sit in the root
    /// collection (customers in the main tree).
    pub fn children_path(&self, server: ServerKind) -> Option<Vec<String>> {
        let child = self.child_kind().filter(|k| server.indexes(*k))?;
        match self.tree_path(server) {
            Some(mut path) => {
                path.push(child.collection().to_string());
                Some(path)
            }
            None if server.root_kind() == child => Some(vec![child.collection().to_string()]),
            None => None,
        }
    }

    /// Fresh node for this entity: its child collection is present when the
    /// tree indexes the child kind, otherwise an empty leaf.
    pub fn tree_node(&self, server: ServerKind) -> TreeNode {
        match self.child_kind() {
            Some(child) if server.indexes(child) => TreeNode::with_collection(child.collection()),
            _ => TreeNode::leaf(),
        }
    }

    pub fn as_customer_mut(&mut self) -> Option<&mut Customer> {
        match self {
            Entity::Customer(c) => Some(c),
            _ => None,
        }
    }
}

impl ChildFactory for Entity {
    fn child_kind(&self) -> Option<EntityKind> {
        match self {
            Entity::Channel(e) => e.child_kind(),
            Entity::Customer(e) => e.child_kind(),
            Entity::User(e) => e.child_kind(),
            Entity::AccessToken(e) => e.child_kind(),
        }
    }

    fn create_child(&self, seed: ChildSeed) -> TapResult<Entity> {
        match self {
            Entity::Channel(e) => e.create_child(seed),
            Entity::Customer(e) => e.create_child(seed),
            Entity::User(e) => e.create_child(seed),
            Entity::AccessToken(e) => e.create_child(seed),
        }
    }
}

impl From<Channel> for Entity {
    fn from(value: Channel) -> Self {
        Entity::Channel(value)
    }
}

#[cfg(test)]
mod tests {
    use tap_core::errors::TapError;

    use super::*;

    fn seed(id: &str, name: Option<&str>, sibling_count: usize) -> ChildSeed {
        ChildSeed {
            id: id.to_string(),
            name: name.map(str::to_string),
            sibling_count,
        }
    }

    #[test]
    fn children_carry_their_lineage() {
        let channel = Entity::from(Channel::new("ch1", "Channel 1"));
        let customer = channel.create_child(seed("c1", Some("Customer 1"), 0)).unwrap();
        let user = customer.create_child(seed("u1", Some("User1"), 0)).unwrap();
        let token = user.create_child(seed("t1", None, 2)).unwrap();

        assert_eq!(customer.parent(), Some(EntityRef::channel("ch1")));
        assert_eq!(token.parent(), Some(EntityRef::user("u1")));
        assert_eq!(token.name(), "Token 3");
        assert_eq!(
            token.tree_path(ServerKind::Main).unwrap(),
            ["customers", "c1", "users", "u1", "accessTokens", "t1"]
        );
        assert_eq!(token.tree_path(ServerKind::Management), None);
    }

    #[test]
    fn customers_sit_in_both_trees() {
        let channel = Entity::from(Channel::new("ch1", "Channel 1"));
        let customer = channel.create_child(seed("c1", Some("Customer 1"), 0)).unwrap();

        assert_eq!(
            customer.tree_path(ServerKind::Management).unwrap(),
            ["channels", "ch1", "customers", "c1"]
        );
        assert_eq!(customer.tree_path(ServerKind::Main).unwrap(), ["customers", "c1"]);
        assert!(customer.tree_node(ServerKind::Management).is_leaf());
        assert!(customer.tree_node(ServerKind::Main).contains("users"));

        assert_eq!(
            channel.children_path(ServerKind::Management).unwrap(),
            ["channels", "ch1", "customers"]
        );
        assert_eq!(channel.children_path(ServerKind::Main).unwrap(), ["customers"]);
    }

    #[test]
    fn names_are_required_except_for_tokens() {
        let channel = Entity::from(Channel::new("ch1", "Channel 1"));
        let err = channel.create_child(seed("c1", None, 0)).unwrap_err();
        let tap = TapError::from_anyhow(&err).unwrap();
        assert_eq!(tap.code(), 422);
        assert_eq!(tap.errors.as_ref().unwrap()["name"][0], "is required");

        let err = channel.create_child(seed("c1", Some("  "), 0)).unwrap_err();
        assert_eq!(TapError::from_anyhow(&err).unwrap().code(), 422);
    }

    #[test]
    fn access_tokens_are_terminal() {
        let token = Entity::AccessToken(AccessToken {
            id: "t1".into(),
            name: "Token 1".into(),
            customer_id: "c1".into(),
            user_id: "u1".into(),
        });
        assert_eq!(token.child_kind(), None);
        assert!(token.create_child(seed("x", Some("x"), 0)).is_err());
        assert_eq!(token.children_path(ServerKind::Main), None);
    }

    #[test]
    fn kinds_round_trip_through_collection_names() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_collection(kind.collection()), Some(kind));
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.collection());
        }
        assert_eq!(EntityKind::from_collection("customer"), None);
    }
}
