//! The viewer facade consumed by operations
//!
//! A facade wraps a host visualization engine. Rendering, scene graph internals
//! and selection query evaluation stay behind this boundary.

use crate::error::ViewerResult;
use crate::types::{AtomRecord, Granularity, Rgb, StructureFormat};
use async_trait::async_trait;
use scenelink_registry::LiveStructure;

#[async_trait]
pub trait ViewerFacade: Send {
    /// Parse and add a structure under a new reference
    async fn load_structure(
        &mut self,
        text: &str,
        format: StructureFormat,
        label: &str,
    ) -> ViewerResult<()>;

    /// The live hierarchy, as reconciliation sees it
    fn live_hierarchy(&self) -> Vec<LiveStructure>;

    /// Atoms of the current selection.
    ///
    /// Fails with `EmptySelection` or `MultipleStructuresSelected` unless exactly
    /// one structure has a non-empty selection.
    fn selected_atoms(&self) -> ViewerResult<Vec<AtomRecord>>;

    /// Replace the selection with the atoms matched by `expression`
    fn select_from_expression(&mut self, expression: &str) -> ViewerResult<()>;

    fn clear_selection(&mut self) -> ViewerResult<()>;

    /// Drop every loaded structure and reset the view
    fn clear_all(&mut self) -> ViewerResult<()>;

    /// Color the selected atoms of the single selected structure
    fn set_color(&mut self, color: Rgb) -> ViewerResult<()>;

    /// Add a representation of `style` over the selection of the single selected structure
    async fn add_representation(&mut self, style: &str) -> ViewerResult<()>;

    fn set_picking_granularity(&mut self, granularity: Granularity) -> ViewerResult<()>;

    /// Point the camera at the selection; no-op when nothing is selected
    fn focus_selection(&mut self) -> ViewerResult<()>;

    fn reset_view(&mut self) -> ViewerResult<()>;

    fn toggle_selection_mode(&mut self, selecting: bool) -> ViewerResult<()>;

    /// Evaluate a script against the viewer and return its value
    fn run_script(&mut self, script: &str) -> ViewerResult<serde_json::Value>;

    /// Evaluate a script that may take a while without blocking the caller's runtime
    async fn run_script_async(&mut self, script: &str) -> ViewerResult<serde_json::Value>;
}
