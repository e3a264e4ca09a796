//! Owned per-viewer state handed to the dispatcher

use crate::error::OperationResult;
use crate::types::{Granularity, StructureFormat};
use crate::viewer::ViewerFacade;
use scenelink_registry::{
    ExternalKey, IdentityRegistry, ReconcileReport, RegistryError, RegistryResult, SyncedState,
};

/// A viewer facade together with the identity registry that names its scene
#[derive(Debug)]
pub struct ViewerSession<V> {
    viewer: V,
    registry: IdentityRegistry,
    connection_id: Option<String>,
}

impl<V: ViewerFacade> ViewerSession<V> {
    pub fn new(viewer: V) -> Self {
        Self {
            viewer,
            registry: IdentityRegistry::new(),
            connection_id: None,
        }
    }

    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut V {
        &mut self.viewer
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn set_connection_id(&mut self, connection_id: Option<String>) {
        self.connection_id = connection_id;
    }

    pub fn into_viewer(self) -> V {
        self.viewer
    }

    /// Sync the registry with the viewer's live hierarchy
    pub fn reconcile(&mut self, reference_id: Option<&str>) -> RegistryResult<ReconcileReport> {
        let hierarchy = self.viewer.live_hierarchy();
        self.registry.reconcile(&hierarchy, reference_id)
    }

    pub fn snapshot(&self) -> RegistryResult<SyncedState> {
        self.registry.snapshot()
    }

    /// Load a structure and name its reference `reference_id`
    ///
    /// An id that already names a node is rejected before the viewer is touched.
    pub async fn load_structure(
        &mut self,
        text: &str,
        format: StructureFormat,
        label: &str,
        reference_id: &str,
    ) -> OperationResult<ReconcileReport> {
        let external = ExternalKey::new(reference_id);
        if let Some(internal) = self.registry.internal_for(&external) {
            return Err(RegistryError::AmbiguousReference {
                internal: internal.clone(),
                external,
                reason: "the id already names a loaded node".to_string(),
            }
            .into());
        }

        self.registry.mark_unsynced();
        self.viewer.load_structure(text, format, label).await?;
        let report = self.reconcile(Some(reference_id))?;
        self.viewer.set_picking_granularity(Granularity::Element)?;
        tracing::info!(reference = reference_id, ?report, "Loaded structure");
        Ok(report)
    }

    /// Clear the viewer and start over with an empty, synced registry
    pub fn clear_all(&mut self) -> OperationResult<()> {
        self.viewer.clear_all()?;
        self.registry = IdentityRegistry::cleared();
        Ok(())
    }
}
