//! Selection and picking operations

use super::Execute;
use crate::error::OperationResult;
use crate::session::ViewerSession;
use crate::types::{AtomRecord, Granularity};
use crate::viewer::ViewerFacade;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Report the atoms of the current selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSelection {
    #[serde(default)]
    pub atom_records: Option<Vec<AtomRecord>>,
}

#[async_trait]
impl Execute for PollSelection {
    type Output = Vec<AtomRecord>;

    async fn execute<V: ViewerFacade>(
        &self,
        session: &mut ViewerSession<V>,
    ) -> OperationResult<Vec<AtomRecord>> {
        Ok(session.viewer().selected_atoms()?)
    }

    fn respond(self, output: Vec<AtomRecord>) -> Self {
        Self {
            atom_records: Some(output),
        }
    }
}

fn focus_default() -> bool {
    true
}

/// Replace the selection with the atoms matched by an expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeSelection {
    pub selection: String,
    #[serde(default = "focus_default")]
    pub focus: bool,
}

impl MakeSelection {
    pub fn new(selection: impl Into<String>) -> Self {
        Self {
            selection: selection.into(),
            focus: true,
        }
    }
}

#[async_trait]
impl Execute for MakeSelection {
    type Output = ();

    async fn execute<V: ViewerFacade>(&self, session: &mut ViewerSession<V>) -> OperationResult<()> {
        let viewer = session.viewer_mut();
        viewer.select_from_expression(&self.selection)?;
        if self.focus {
            viewer.focus_selection()?;
        }
        Ok(())
    }

    fn respond(self, _: ()) -> Self {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSelection {}

#[async_trait]
impl Execute for FocusSelection {
    type Output = ();

    async fn execute<V: ViewerFacade>(&self, session: &mut ViewerSession<V>) -> OperationResult<()> {
        Ok(session.viewer_mut().focus_selection()?)
    }

    fn respond(self, _: ()) -> Self {
        self
    }
}

/// Enter or leave interactive selection mode; leaving clears the selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleSelectionMode {
    pub is_selecting: bool,
}

impl ToggleSelectionMode {
    pub fn new(is_selecting: bool) -> Self {
        Self { is_selecting }
    }
}

#[async_trait]
impl Execute for ToggleSelectionMode {
    type Output = ();

    async fn execute<V: ViewerFacade>(&self, session: &mut ViewerSession<V>) -> OperationResult<()> {
        let viewer = session.viewer_mut();
        if !self.is_selecting {
            viewer.clear_selection()?;
        }
        Ok(viewer.toggle_selection_mode(self.is_selecting)?)
    }

    fn respond(self, _: ()) -> Self {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPickingGranularity {
    pub granularity: Granularity,
}

impl SetPickingGranularity {
    pub fn new(granularity: Granularity) -> Self {
        Self { granularity }
    }
}

#[async_trait]
impl Execute for SetPickingGranularity {
    type Output = ();

    async fn execute<V: ViewerFacade>(&self, session: &mut ViewerSession<V>) -> OperationResult<()> {
        Ok(session.viewer_mut().set_picking_granularity(self.granularity)?)
    }

    fn respond(self, _: ()) -> Self {
        self
    }
}
