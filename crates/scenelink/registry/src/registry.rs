//! The dual-keyed identity registry

use crate::error::{RegistryError, RegistryResult};
use crate::keys::{ExternalKey, InternalKey, NodeKind, ObjectHandle};
use crate::nodes::{Node, Structure};
use std::collections::HashMap;

/// Bijection between internal and external keys plus the node tree hanging off it.
///
/// Nodes are created lazily by [`reconcile`](IdentityRegistry::reconcile) and are
/// never removed one by one; a "clear all" replaces the whole registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityRegistry {
    to_external: HashMap<InternalKey, ExternalKey>,
    to_internal: HashMap<ExternalKey, InternalKey>,
    nodes: HashMap<ExternalKey, Node>,
    /// Engine object currently behind each internal key
    objects: HashMap<InternalKey, ObjectHandle>,
    /// Top-level references in first-seen order
    references: Vec<ExternalKey>,
    synced: bool,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh, empty registry that already counts as in sync
    pub fn cleared() -> Self {
        Self {
            synced: true,
            ..Self::default()
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Mark the registry stale, e.g. while the viewer is loading new data
    pub fn mark_unsynced(&mut self) {
        self.synced = false;
    }

    pub(crate) fn mark_synced(&mut self) {
        self.synced = true;
    }

    /// Number of bound nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn external_for(&self, internal: &InternalKey) -> Option<&ExternalKey> {
        self.to_external.get(internal)
    }

    pub fn internal_for(&self, external: &ExternalKey) -> Option<&InternalKey> {
        self.to_internal.get(external)
    }

    pub fn node(&self, external: &ExternalKey) -> Option<&Node> {
        self.nodes.get(external)
    }

    pub fn object_for(&self, internal: &InternalKey) -> Option<ObjectHandle> {
        self.objects.get(internal).copied()
    }

    /// Top-level references in first-seen order
    pub fn references(&self) -> &[ExternalKey] {
        &self.references
    }

    /// Every (internal, external) binding
    pub fn bindings(&self) -> impl Iterator<Item = (&InternalKey, &ExternalKey)> {
        self.to_external.iter()
    }

    /// The single structure owned by a reference
    pub fn structure_for_reference(&self, reference: &ExternalKey) -> RegistryResult<&Structure> {
        let node = self
            .nodes
            .get(reference)
            .ok_or_else(|| RegistryError::UnknownNode(reference.clone()))?;
        let Node::Reference(reference_node) = node else {
            return Err(RegistryError::KindMismatch {
                internal: node.internal_key().clone(),
                expected: NodeKind::Reference,
                found: node.kind(),
            });
        };

        match reference_node.structures.as_slice() {
            [only] => match self.nodes.get(only) {
                Some(Node::Structure(structure)) => Ok(structure),
                _ => Err(RegistryError::UnknownNode(only.clone())),
            },
            other => Err(RegistryError::StructureCount {
                reference: reference.clone(),
                count: other.len(),
            }),
        }
    }

    /// Generate an external key that is not bound to anything yet
    pub fn fresh_key(&self) -> ExternalKey {
        loop {
            let candidate = ExternalKey::generate();
            if !self.to_internal.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Look up the external key bound to `internal`, requiring a node of `kind`
    pub(crate) fn existing(
        &self,
        internal: &InternalKey,
        kind: NodeKind,
    ) -> RegistryResult<Option<ExternalKey>> {
        let Some(external) = self.to_external.get(internal) else {
            return Ok(None);
        };
        let found = self
            .nodes
            .get(external)
            .map(Node::kind)
            .ok_or_else(|| RegistryError::UnknownNode(external.clone()))?;
        if found != kind {
            return Err(RegistryError::KindMismatch {
                internal: internal.clone(),
                expected: kind,
                found,
            });
        }
        Ok(Some(external.clone()))
    }

    /// Bind a new node. Both of its keys must be unbound.
    pub(crate) fn bind(&mut self, node: Node) -> RegistryResult<ExternalKey> {
        let internal = node.internal_key().clone();
        let external = node.external_key().clone();

        if let Some(bound) = self.to_external.get(&internal) {
            return Err(RegistryError::AmbiguousReference {
                internal,
                external,
                reason: format!("internal key is already bound to {bound}"),
            });
        }
        if let Some(bound) = self.to_internal.get(&external) {
            return Err(RegistryError::AmbiguousReference {
                internal,
                external,
                reason: format!("external key is already bound to {bound}"),
            });
        }

        tracing::debug!(kind = %node.kind(), %internal, %external, "Registered node");
        self.to_external.insert(internal.clone(), external.clone());
        self.to_internal.insert(external.clone(), internal);
        self.nodes.insert(external.clone(), node);
        Ok(external)
    }

    /// Record the engine object behind `internal`; returns true if it changed
    pub(crate) fn associate(&mut self, internal: &InternalKey, object: ObjectHandle) -> bool {
        self.objects.insert(internal.clone(), object) != Some(object)
    }

    /// Append `child` to `parent` once
    pub(crate) fn adopt(&mut self, parent: &ExternalKey, child: &ExternalKey) -> RegistryResult<()> {
        self.nodes
            .get_mut(parent)
            .ok_or_else(|| RegistryError::UnknownNode(parent.clone()))?
            .adopt(child);
        Ok(())
    }

    /// Add a reference to the synced top-level list once
    pub(crate) fn publish_reference(&mut self, reference: &ExternalKey) {
        if !self.references.contains(reference) {
            self.references.push(reference.clone());
        }
    }
}
