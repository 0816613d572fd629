//! tap-server: an in-memory simulation of the TAP management and main
//! resource servers.
//!
//! One [`TapSystem`] owns every entity. The management server indexes
//! channels and their customers; the main server indexes customers, users
//! and access tokens. Customers appear in both, and every write keeps the
//! two trees and the registry in step.

pub mod entity;
pub mod ids;
pub mod payload;
pub mod registry;
pub mod server;
pub mod system;
pub mod tree;

pub use entity::{AccessToken, Channel, ChildFactory, Customer, Entity, EntityId, EntityKind, EntityRef, User};
pub use ids::{IdAllocator, IdStrategy};
pub use payload::{CreatePayload, RenamePayload};
pub use registry::EntityRegistry;
pub use server::{ResourceServer, ServerKind};
pub use system::TapSystem;
pub use tree::{EntityTree, TreeNode};

pub use tap_core::{Response, TapConfig};
