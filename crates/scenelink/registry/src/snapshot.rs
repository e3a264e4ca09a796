//! Serializable view of the registry tree

use crate::error::{RegistryError, RegistryResult};
use crate::keys::{ExternalKey, InternalKey, NodeKind};
use crate::nodes::Node;
use crate::registry::IdentityRegistry;
use serde::{Deserialize, Serialize};

/// Full registry tree as seen by the controlling process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedState {
    pub synced: bool,
    pub references: Vec<ReferenceState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceState {
    pub kind: NodeKind,
    pub external_key: ExternalKey,
    pub internal_key: InternalKey,
    pub structures: Vec<StructureState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureState {
    pub kind: NodeKind,
    pub external_key: ExternalKey,
    pub internal_key: InternalKey,
    pub reference_key: ExternalKey,
    pub data_id: Option<String>,
    pub components: Vec<ComponentState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentState {
    pub kind: NodeKind,
    pub external_key: ExternalKey,
    pub internal_key: InternalKey,
    pub group_key: String,
    pub representations: Vec<RepresentationState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentationState {
    pub kind: NodeKind,
    pub external_key: ExternalKey,
    pub internal_key: InternalKey,
    pub name: String,
}

impl SyncedState {
    /// Count of nodes at every level
    pub fn node_count(&self) -> usize {
        self.references
            .iter()
            .map(|reference| {
                1 + reference
                    .structures
                    .iter()
                    .map(|structure| {
                        1 + structure
                            .components
                            .iter()
                            .map(|component| 1 + component.representations.len())
                            .sum::<usize>()
                    })
                    .sum::<usize>()
            })
            .sum()
    }
}

impl IdentityRegistry {
    /// Build the nested tree in insertion order
    pub fn snapshot(&self) -> RegistryResult<SyncedState> {
        let references = self
            .references()
            .iter()
            .map(|key| self.reference_state(key))
            .collect::<RegistryResult<_>>()?;

        Ok(SyncedState {
            synced: self.is_synced(),
            references,
        })
    }

    fn reference_state(&self, key: &ExternalKey) -> RegistryResult<ReferenceState> {
        let Some(Node::Reference(node)) = self.node(key) else {
            return Err(self.wrong_kind(key, NodeKind::Reference));
        };
        Ok(ReferenceState {
            kind: NodeKind::Reference,
            external_key: node.external_key.clone(),
            internal_key: node.internal_key.clone(),
            structures: node
                .structures
                .iter()
                .map(|child| self.structure_state(child))
                .collect::<RegistryResult<_>>()?,
        })
    }

    fn structure_state(&self, key: &ExternalKey) -> RegistryResult<StructureState> {
        let Some(Node::Structure(node)) = self.node(key) else {
            return Err(self.wrong_kind(key, NodeKind::Structure));
        };
        Ok(StructureState {
            kind: NodeKind::Structure,
            external_key: node.external_key.clone(),
            internal_key: node.internal_key.clone(),
            reference_key: node.reference_key.clone(),
            data_id: node.data_id.clone(),
            components: node
                .components
                .iter()
                .map(|child| self.component_state(child))
                .collect::<RegistryResult<_>>()?,
        })
    }

    fn component_state(&self, key: &ExternalKey) -> RegistryResult<ComponentState> {
        let Some(Node::Component(node)) = self.node(key) else {
            return Err(self.wrong_kind(key, NodeKind::Component));
        };
        Ok(ComponentState {
            kind: NodeKind::Component,
            external_key: node.external_key.clone(),
            internal_key: node.internal_key.clone(),
            group_key: node.group_key.clone(),
            representations: node
                .representations
                .iter()
                .map(|child| self.representation_state(child))
                .collect::<RegistryResult<_>>()?,
        })
    }

    fn representation_state(&self, key: &ExternalKey) -> RegistryResult<RepresentationState> {
        let Some(Node::Representation(node)) = self.node(key) else {
            return Err(self.wrong_kind(key, NodeKind::Representation));
        };
        Ok(RepresentationState {
            kind: NodeKind::Representation,
            external_key: node.external_key.clone(),
            internal_key: node.internal_key.clone(),
            name: node.name.clone(),
        })
    }

    fn wrong_kind(&self, key: &ExternalKey, expected: NodeKind) -> RegistryError {
        match self.node(key) {
            Some(node) => RegistryError::KindMismatch {
                internal: node.internal_key().clone(),
                expected,
                found: node.kind(),
            },
            None => RegistryError::UnknownNode(key.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ObjectHandle;
    use crate::live::{LiveComponent, LiveRepresentation, LiveStructure};

    fn hierarchy() -> Vec<LiveStructure> {
        vec![LiveStructure {
            reference_key: "ref-1".into(),
            key: "struct-1".into(),
            data_id: Some("1crn".to_string()),
            object: ObjectHandle::new(1),
            components: vec![
                LiveComponent {
                    key: "comp-polymer".into(),
                    group_key: "polymer".to_string(),
                    object: ObjectHandle::new(2),
                    representations: vec![LiveRepresentation {
                        key: "repr-cartoon".into(),
                        name: "cartoon".to_string(),
                        object: ObjectHandle::new(3),
                    }],
                },
                LiveComponent {
                    key: "comp-ligand".into(),
                    group_key: "ligand".to_string(),
                    object: ObjectHandle::new(4),
                    representations: Vec::new(),
                },
            ],
        }]
    }

    #[test]
    fn empty_registry_has_empty_snapshot() {
        let state = IdentityRegistry::cleared().snapshot().unwrap();
        assert!(state.synced);
        assert!(state.references.is_empty());
        assert_eq!(state.node_count(), 0);
    }

    #[test]
    fn snapshot_mirrors_tree_in_order() {
        let mut registry = IdentityRegistry::new();
        registry.reconcile(&hierarchy(), Some("crambin")).unwrap();
        let state = registry.snapshot().unwrap();

        assert!(state.synced);
        assert_eq!(state.node_count(), 5);
        let structure = &state.references[0].structures[0];
        assert_eq!(structure.reference_key, ExternalKey::new("crambin"));
        let groups: Vec<_> = structure
            .components
            .iter()
            .map(|c| c.group_key.as_str())
            .collect();
        assert_eq!(groups, ["polymer", "ligand"]);
        assert_eq!(structure.components[0].representations[0].name, "cartoon");
    }

    #[test]
    fn snapshot_serializes_kind_on_every_node() {
        let mut registry = IdentityRegistry::new();
        registry.reconcile(&hierarchy(), Some("crambin")).unwrap();
        let json = serde_json::to_value(registry.snapshot().unwrap()).unwrap();

        let reference = &json["references"][0];
        assert_eq!(reference["kind"], "reference");
        assert_eq!(reference["external_key"], "crambin");
        assert_eq!(reference["structures"][0]["kind"], "structure");
        assert_eq!(
            reference["structures"][0]["components"][0]["representations"][0]["kind"],
            "representation"
        );
    }
}
