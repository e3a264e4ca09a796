//! Registry state operations

use super::Execute;
use crate::error::OperationResult;
use crate::session::ViewerSession;
use crate::viewer::ViewerFacade;
use async_trait::async_trait;
use scenelink_registry::{ReconcileReport, ReferenceState, SyncedState};
use serde::{Deserialize, Serialize};

/// Register the caller's connection id and report the synced registry tree.
///
/// Answering at all tells the caller the viewer is ready to take requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetState {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub references: Vec<ReferenceState>,
}

impl GetState {
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: Some(connection_id.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Execute for GetState {
    type Output = SyncedState;

    async fn execute<V: ViewerFacade>(
        &self,
        session: &mut ViewerSession<V>,
    ) -> OperationResult<SyncedState> {
        session.set_connection_id(self.connection_id.clone());
        Ok(session.snapshot()?)
    }

    fn respond(self, output: SyncedState) -> Self {
        Self {
            synced: output.synced,
            references: output.references,
            ..self
        }
    }
}

/// Sync the registry with the viewer, naming a new reference `reference_id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconcile {
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub report: Option<ReconcileReport>,
}

impl Reconcile {
    pub fn named(reference_id: impl Into<String>) -> Self {
        Self {
            reference_id: Some(reference_id.into()),
            report: None,
        }
    }
}

#[async_trait]
impl Execute for Reconcile {
    type Output = ReconcileReport;

    async fn execute<V: ViewerFacade>(
        &self,
        session: &mut ViewerSession<V>,
    ) -> OperationResult<ReconcileReport> {
        Ok(session.reconcile(self.reference_id.as_deref())?)
    }

    fn respond(self, output: ReconcileReport) -> Self {
        Self {
            report: Some(output),
            ..self
        }
    }
}
