//! Registry node records
//!
//! Children are held as external keys; the registry owns every node by value.

use crate::keys::{ExternalKey, InternalKey, NodeKind};
use serde::{Deserialize, Serialize};

/// Top-level handle named by the controlling process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub external_key: ExternalKey,
    pub internal_key: InternalKey,
    pub structures: Vec<ExternalKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub external_key: ExternalKey,
    pub internal_key: InternalKey,
    /// External key of the owning reference
    pub reference_key: ExternalKey,
    pub data_id: Option<String>,
    pub components: Vec<ExternalKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub external_key: ExternalKey,
    pub internal_key: InternalKey,
    pub group_key: String,
    pub representations: Vec<ExternalKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    pub external_key: ExternalKey,
    pub internal_key: InternalKey,
    pub name: String,
}

/// Any registered node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Reference(Reference),
    Structure(Structure),
    Component(Component),
    Representation(Representation),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Reference(_) => NodeKind::Reference,
            Node::Structure(_) => NodeKind::Structure,
            Node::Component(_) => NodeKind::Component,
            Node::Representation(_) => NodeKind::Representation,
        }
    }

    pub fn external_key(&self) -> &ExternalKey {
        match self {
            Node::Reference(n) => &n.external_key,
            Node::Structure(n) => &n.external_key,
            Node::Component(n) => &n.external_key,
            Node::Representation(n) => &n.external_key,
        }
    }

    pub fn internal_key(&self) -> &InternalKey {
        match self {
            Node::Reference(n) => &n.internal_key,
            Node::Structure(n) => &n.internal_key,
            Node::Component(n) => &n.internal_key,
            Node::Representation(n) => &n.internal_key,
        }
    }

    /// External keys of this node's direct children
    pub fn children(&self) -> &[ExternalKey] {
        match self {
            Node::Reference(n) => &n.structures,
            Node::Structure(n) => &n.components,
            Node::Component(n) => &n.representations,
            Node::Representation(_) => &[],
        }
    }

    /// Append a child once; returns false if it was already present
    pub(crate) fn adopt(&mut self, child: &ExternalKey) -> bool {
        let children = match self {
            Node::Reference(n) => &mut n.structures,
            Node::Structure(n) => &mut n.components,
            Node::Component(n) => &mut n.representations,
            Node::Representation(_) => return false,
        };
        if children.contains(child) {
            return false;
        }
        children.push(child.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component() -> Node {
        Node::Component(Component {
            external_key: "c1".into(),
            internal_key: "cell-1".into(),
            group_key: "polymer".to_string(),
            representations: Vec::new(),
        })
    }

    #[test]
    fn adopt_is_idempotent() {
        let mut node = component();
        let child = ExternalKey::new("r1");
        assert!(node.adopt(&child));
        assert!(!node.adopt(&child));
        assert_eq!(node.children(), &[child]);
    }

    #[test]
    fn representations_have_no_children() {
        let mut node = Node::Representation(Representation {
            external_key: "r1".into(),
            internal_key: "cell-2".into(),
            name: "cartoon".to_string(),
        });
        assert!(!node.adopt(&ExternalKey::new("x")));
        assert!(node.children().is_empty());
        assert_eq!(node.kind(), NodeKind::Representation);
    }
}
