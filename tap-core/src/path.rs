use std::fmt;

/// A slash-delimited resource path, split once and read through slices.
///
/// Splitting is deliberately naive: `""` is the single segment `""` and a
/// trailing slash leaves an empty last segment. Neither resolves in a tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path.split('/').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, usually an entity id.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Everything but the last segment.
    pub fn parent(&self) -> &[String] {
        match self.segments.split_last() {
            Some((_, parent)) => parent,
            None => &[],
        }
    }

    /// The trailing `[type, id]` pair, if the path has at least two segments.
    pub fn target(&self) -> Option<(&str, &str)> {
        match self.segments.as_slice() {
            [.., kind, id] => Some((kind.as_str(), id.as_str())),
            _ => None,
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
