//! tap-core: transport-free building blocks for TAP resource servers.

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod path;
pub mod response;
pub mod service;

pub use config::{keys, TapConfig, TapConfigSnapshot};
pub use dispatch::send_command;
pub use errors::{ErrorKind, TapError, TapResult, NOT_ALLOWED_MESSAGE, NOT_FOUND_MESSAGE};
pub use path::ResourcePath;
pub use response::Response;
pub use service::{RequestMethod, ResourceService, ServiceCapabilities};
