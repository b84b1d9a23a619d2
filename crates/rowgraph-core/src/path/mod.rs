//! Module: path
//! Responsibility: immutable, structurally compared navigable paths used as
//! identity keys for plan and initializer nodes.
//! Does not own: the mapping model the segments name.
//! Boundary: paths are created while building plans and never mutated.

#[cfg(test)]
mod tests;

use crate::{ELEMENT_SEGMENT, IDENTIFIER_SEGMENT};
use serde::{Serialize, Serializer};
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

///
/// PathKind
///
/// `EntityIdentifier` marks a path that addresses the identifier of the
/// entity at its parent path rather than a navigable of its own.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PathKind {
    Standard,
    EntityIdentifier,
}

///
/// NavigablePath
///
/// Cons-list of segments with an optional treat target per segment.
/// Clones share structure; equality and hashing are structural over the
/// segment sequence and treat targets.
///

#[derive(Clone)]
pub struct NavigablePath {
    node: Arc<PathNode>,
}

struct PathNode {
    parent: Option<NavigablePath>,
    segment: String,
    treat: Option<String>,
    kind: PathKind,
    depth: usize,
}

impl NavigablePath {
    /// Root path for an entity result.
    #[must_use]
    pub fn root(entity: impl Into<String>) -> Self {
        Self::from_node(PathNode {
            parent: None,
            segment: entity.into(),
            treat: None,
            kind: PathKind::Standard,
            depth: 1,
        })
    }

    /// Extend this path by one segment.
    #[must_use]
    pub fn append(&self, segment: impl Into<String>) -> Self {
        self.child(segment.into(), PathKind::Standard)
    }

    /// Path of the element of the collection at this path.
    #[must_use]
    pub fn element(&self) -> Self {
        self.child(ELEMENT_SEGMENT.to_string(), PathKind::Standard)
    }

    /// Path addressing the identifier of the entity at this path.
    #[must_use]
    pub fn identifier(&self) -> Self {
        self.child(IDENTIFIER_SEGMENT.to_string(), PathKind::EntityIdentifier)
    }

    /// Same navigable, narrowed to a subtype.
    #[must_use]
    pub fn treat_as(&self, entity: impl Into<String>) -> Self {
        Self::from_node(PathNode {
            parent: self.node.parent.clone(),
            segment: self.node.segment.clone(),
            treat: Some(entity.into()),
            kind: self.node.kind,
            depth: self.node.depth,
        })
    }

    fn child(&self, segment: String, kind: PathKind) -> Self {
        Self::from_node(PathNode {
            parent: Some(self.clone()),
            segment,
            treat: None,
            kind,
            depth: self.node.depth + 1,
        })
    }

    fn from_node(node: PathNode) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.node.parent.as_ref()
    }

    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.node.segment
    }

    #[must_use]
    pub fn treat_target(&self) -> Option<&str> {
        self.node.treat.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> PathKind {
        self.node.kind
    }

    /// Number of segments, the root counting as one.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.node.depth
    }

    /// Name of the root segment.
    #[must_use]
    pub fn root_name(&self) -> &str {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }

        current.local_name()
    }

    /// Segments from the root down to this path.
    #[must_use]
    pub fn segments(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(self.depth());
        let mut current = Some(self);
        while let Some(path) = current {
            out.push(path.local_name());
            current = path.parent();
        }
        out.reverse();

        out
    }

    /// True when `other` lies strictly below this path.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        if other.depth() <= self.depth() {
            return false;
        }

        let mut current = other.parent();
        while let Some(path) = current {
            if path.depth() == self.depth() {
                return path == self;
            }
            current = path.parent();
        }

        false
    }

    #[must_use]
    pub fn full_path(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for NavigablePath {
    fn eq(&self, other: &Self) -> bool {
        let mut left = self;
        let mut right = other;

        loop {
            if Arc::ptr_eq(&left.node, &right.node) {
                return true;
            }
            if left.node.depth != right.node.depth
                || left.node.segment != right.node.segment
                || left.node.treat != right.node.treat
            {
                return false;
            }

            match (left.parent(), right.parent()) {
                (Some(l), Some(r)) => {
                    left = l;
                    right = r;
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl Eq for NavigablePath {}

impl Hash for NavigablePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.depth.hash(state);
        let mut current = Some(self);
        while let Some(path) = current {
            path.node.segment.hash(state);
            path.node.treat.hash(state);
            current = path.parent();
        }
    }
}

impl fmt::Display for NavigablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent() {
            write!(f, "{parent}.")?;
        }
        f.write_str(&self.node.segment)?;
        if let Some(treat) = &self.node.treat {
            write!(f, "({treat})")?;
        }

        Ok(())
    }
}

impl fmt::Debug for NavigablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NavigablePath({self})")
    }
}

impl Serialize for NavigablePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
