use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tap_core::errors::TapError;
use tap_core::TapResult;

/// One node of an entity tree. Keys are collection names or entity ids,
/// a node with no children is a leaf. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TreeNode {
    children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    pub fn leaf() -> Self {
        Self::default()
    }

    /// `{name: {}}`
    pub fn with_collection(name: &str) -> Self {
        let mut node = Self::default();
        node.children.insert(name.to_string(), Self::leaf());
        node
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    pub fn child(&self, key: &str) -> Option<&TreeNode> {
        self.children.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A structural index over entity ids, e.g.
/// `{"customers": {"c1": {"users": {"u1": {"accessTokens": {}}}}}}`.
///
/// Holds no entity data; the registry does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTree {
    root: TreeNode,
}

impl EntityTree {
    /// A tree with one empty root collection.
    pub fn new(root_collection: &str) -> Self {
        Self {
            root: TreeNode::with_collection(root_collection),
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Walk `segments` from the root. The caller's path is only read.
    pub fn resolve<S: AsRef<str>>(&self, segments: &[S]) -> TapResult<&TreeNode> {
        let mut node = &self.root;
        for (depth, segment) in segments.iter().enumerate() {
            let segment = segment.as_ref();
            node = node.children.get(segment).ok_or_else(|| missing(segments, depth))?;
        }
        Ok(node)
    }

    fn resolve_mut<S: AsRef<str>>(&mut self, segments: &[S]) -> TapResult<&mut TreeNode> {
        let mut node = &mut self.root;
        for (depth, segment) in segments.iter().enumerate() {
            node = node
                .children
                .get_mut(segment.as_ref())
                .ok_or_else(|| missing(segments, depth))?;
        }
        Ok(node)
    }

    pub fn contains<S: AsRef<str>>(&self, segments: &[S]) -> bool {
        self.resolve(segments).is_ok()
    }

    /// JSON copy of the node at `segments`.
    pub fn snapshot<S: AsRef<str>>(&self, segments: &[S]) -> TapResult<Value> {
        let node = self.resolve(segments)?;
        Ok(serde_json::to_value(node)?)
    }

    /// Add `key` under the node at `parent`. Fails without changes when the
    /// parent is missing (404) or the key is taken (409).
    pub fn insert<S: AsRef<str>>(&mut self, parent: &[S], key: &str, node: TreeNode) -> TapResult<()> {
        let parent_node = self.resolve_mut(parent)?;
        if parent_node.children.contains_key(key) {
            return Err(TapError::conflict(format!("`{key}` already exists under `{}`", join(parent))).into_anyhow());
        }
        parent_node.children.insert(key.to_string(), node);
        Ok(())
    }

    /// Detach `key` from the node at `parent` and hand the subtree back.
    pub fn remove<S: AsRef<str>>(&mut self, parent: &[S], key: &str) -> TapResult<TreeNode> {
        let parent_node = self.resolve_mut(parent)?;
        parent_node
            .children
            .remove(key)
            .ok_or_else(|| TapError::not_found(format!("`{key}` is not under `{}`", join(parent))).into_anyhow())
    }
}

fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments.iter().map(|s| s.as_ref()).collect::<Vec<&str>>().join("/")
}

fn missing<S: AsRef<str>>(segments: &[S], depth: usize) -> anyhow::Error {
    TapError::not_found(format!(
        "segment `{}` missing under `{}`",
        segments[depth].as_ref(),
        join(&segments[..depth])
    ))
    .into_anyhow()
}
