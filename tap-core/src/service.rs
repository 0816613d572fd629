use std::fmt;

use serde_json::Value;

use crate::errors::{TapError, TapResult};
use crate::path::ResourcePath;

/// Verbs a resource server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RequestMethod {
    pub const ALL: [RequestMethod; 4] = [
        RequestMethod::Get,
        RequestMethod::Post,
        RequestMethod::Put,
        RequestMethod::Delete,
    ];

    /// Case-insensitive parse. Anything else (`patch`, `head`, ...) is `None`.
    pub fn parse(request: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(request))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "get",
            RequestMethod::Post => "post",
            RequestMethod::Put => "put",
            RequestMethod::Delete => "delete",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which verbs a server accepts. Everything else is answered with 405.
#[derive(Debug, Clone)]
pub struct ServiceCapabilities {
    pub allowed_methods: Vec<RequestMethod>,
}

impl ServiceCapabilities {
    /// get, post, put, delete.
    pub fn standard_crud() -> Self {
        Self {
            allowed_methods: RequestMethod::ALL.to_vec(),
        }
    }

    pub fn read_only() -> Self {
        Self {
            allowed_methods: vec![RequestMethod::Get],
        }
    }

    /// Build from verb names, e.g. a config list. Unknown names are skipped.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed_methods = Vec::new();
        for method in names.into_iter().filter_map(|n| RequestMethod::parse(n.as_ref())) {
            if !allowed_methods.contains(&method) {
                allowed_methods.push(method);
            }
        }
        Self { allowed_methods }
    }

    pub fn allows(&self, method: RequestMethod) -> bool {
        self.allowed_methods.contains(&method)
    }
}

impl Default for ServiceCapabilities {
    fn default() -> Self {
        Self::standard_crud()
    }
}

/// A resource server as seen by the dispatcher.
///
/// - `get`    → snapshot of the node at `path`
/// - `create` → create a child, returns the new id
/// - `update` → rename the entity at `path`
/// - `remove` → delete the entity at `path`
///
/// Every method defaults to "Request not allowed", so a service only
/// overrides what it supports.
pub trait ResourceService {
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::standard_crud()
    }

    fn get(&self, _path: &ResourcePath) -> TapResult<Value> {
        Err(TapError::method_not_allowed("get is not implemented").into_anyhow())
    }

    fn create(&mut self, _path: &ResourcePath, _data: Value) -> TapResult<Value> {
        Err(TapError::method_not_allowed("post is not implemented").into_anyhow())
    }

    fn update(&mut self, _path: &ResourcePath, _data: Value) -> TapResult<()> {
        Err(TapError::method_not_allowed("put is not implemented").into_anyhow())
    }

    fn remove(&mut self, _path: &ResourcePath) -> TapResult<()> {
        Err(TapError::method_not_allowed("delete is not implemented").into_anyhow())
    }
}
