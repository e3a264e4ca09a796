//! Reconciliation of the registry against a viewer's live hierarchy

use crate::error::{RegistryError, RegistryResult};
use crate::keys::{ExternalKey, InternalKey, NodeKind};
use crate::live::{LiveComponent, LiveRepresentation, LiveStructure};
use crate::nodes::{Component, Node, Reference, Representation, Structure};
use crate::registry::IdentityRegistry;
use serde::{Deserialize, Serialize};

/// What a reconciliation pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub references: usize,
    pub structures: usize,
    pub components: usize,
    pub representations: usize,
    /// Existing representations whose engine object was replaced
    pub refreshed: usize,
}

impl ReconcileReport {
    /// Total number of nodes created
    pub fn created(&self) -> usize {
        self.references + self.structures + self.components + self.representations
    }
}

/// Per-pass bookkeeping
struct Pass<'a> {
    reference_id: Option<&'a str>,
    /// Internal key of the reference named by `reference_id`, once used
    named: Option<InternalKey>,
    report: ReconcileReport,
}

impl IdentityRegistry {
    /// Bring the registry in line with `hierarchy`, walking it depth first.
    ///
    /// `reference_id` names a reference the registry has not seen before. Known
    /// nodes keep their external keys; representations always take the latest
    /// engine object. The pass is all-or-nothing: on error the registry is left
    /// exactly as it was, including its `synced` flag.
    pub fn reconcile(
        &mut self,
        hierarchy: &[LiveStructure],
        reference_id: Option<&str>,
    ) -> RegistryResult<ReconcileReport> {
        let mut staged = self.clone();
        let mut pass = Pass {
            reference_id,
            named: None,
            report: ReconcileReport::default(),
        };

        for structure in hierarchy {
            staged.visit_structure(structure, &mut pass)?;
        }

        staged.mark_synced();
        *self = staged;

        let report = pass.report;
        tracing::debug!(
            created = report.created(),
            refreshed = report.refreshed,
            total = self.len(),
            "Reconciled registry"
        );
        Ok(report)
    }

    fn visit_structure(&mut self, live: &LiveStructure, pass: &mut Pass<'_>) -> RegistryResult<()> {
        let reference = self.resolve_reference(&live.reference_key, pass)?;
        self.publish_reference(&reference);

        let structure = match self.existing(&live.key, NodeKind::Structure)? {
            Some(external) => external,
            None => {
                let fresh = self.fresh_key();
                let external = self.bind(Node::Structure(Structure {
                    external_key: fresh,
                    internal_key: live.key.clone(),
                    reference_key: reference.clone(),
                    data_id: live.data_id.clone(),
                    components: Vec::new(),
                }))?;
                self.associate(&live.key, live.object);
                pass.report.structures += 1;
                external
            }
        };
        self.adopt(&reference, &structure)?;

        for component in &live.components {
            self.visit_component(&structure, component, pass)?;
        }
        Ok(())
    }

    fn visit_component(
        &mut self,
        parent: &ExternalKey,
        live: &LiveComponent,
        pass: &mut Pass<'_>,
    ) -> RegistryResult<()> {
        let component = match self.existing(&live.key, NodeKind::Component)? {
            Some(external) => external,
            None => {
                let fresh = self.fresh_key();
                let external = self.bind(Node::Component(Component {
                    external_key: fresh,
                    internal_key: live.key.clone(),
                    group_key: live.group_key.clone(),
                    representations: Vec::new(),
                }))?;
                self.associate(&live.key, live.object);
                pass.report.components += 1;
                external
            }
        };
        self.adopt(parent, &component)?;

        for representation in &live.representations {
            self.visit_representation(&component, representation, pass)?;
        }
        Ok(())
    }

    fn visit_representation(
        &mut self,
        parent: &ExternalKey,
        live: &LiveRepresentation,
        pass: &mut Pass<'_>,
    ) -> RegistryResult<()> {
        let representation = match self.existing(&live.key, NodeKind::Representation)? {
            Some(external) => {
                if self.associate(&live.key, live.object) {
                    pass.report.refreshed += 1;
                }
                external
            }
            None => {
                let fresh = self.fresh_key();
                let external = self.bind(Node::Representation(Representation {
                    external_key: fresh,
                    internal_key: live.key.clone(),
                    name: live.name.clone(),
                }))?;
                self.associate(&live.key, live.object);
                pass.report.representations += 1;
                external
            }
        };
        self.adopt(parent, &representation)
    }

    /// Reuse a known reference or name a new one from the caller-supplied id
    fn resolve_reference(
        &mut self,
        internal: &InternalKey,
        pass: &mut Pass<'_>,
    ) -> RegistryResult<ExternalKey> {
        if let Some(external) = self.existing(internal, NodeKind::Reference)? {
            return Ok(external);
        }

        let Some(id) = pass.reference_id else {
            return Err(RegistryError::UnnamedReference {
                internal: internal.clone(),
            });
        };
        let external = ExternalKey::new(id);

        // One caller id can name only one new reference per pass.
        if let Some(named) = &pass.named {
            return Err(RegistryError::AmbiguousReference {
                internal: internal.clone(),
                external,
                reason: format!("the id already named {named} in this pass"),
            });
        }

        let external = self.bind(Node::Reference(Reference {
            external_key: external,
            internal_key: internal.clone(),
            structures: Vec::new(),
        }))?;
        pass.named = Some(internal.clone());
        pass.report.references += 1;
        Ok(external)
    }
}
