//! Operations that change what the viewer shows

use super::Execute;
use crate::error::OperationResult;
use crate::session::ViewerSession;
use crate::types::{ColorParseError, Rgb, StructureFormat};
use crate::viewer::ViewerFacade;
use async_trait::async_trait;
use scenelink_registry::ReconcileReport;
use serde::{Deserialize, Serialize};

fn label_default() -> String {
    "model".to_string()
}

/// Load a structure from text and name its reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStructure {
    /// External key of the new reference
    pub ref_id: String,
    /// Structure file contents
    pub data: String,
    #[serde(default)]
    pub format: StructureFormat,
    #[serde(default = "label_default")]
    pub label: String,
    #[serde(default)]
    pub report: Option<ReconcileReport>,
}

impl LoadStructure {
    pub fn new(ref_id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            data: data.into(),
            format: StructureFormat::Pdb,
            label: label_default(),
            report: None,
        }
    }
}

#[async_trait]
impl Execute for LoadStructure {
    type Output = ReconcileReport;

    async fn execute<V: ViewerFacade>(
        &self,
        session: &mut ViewerSession<V>,
    ) -> OperationResult<ReconcileReport> {
        session
            .load_structure(&self.data, self.format, &self.label, &self.ref_id)
            .await
    }

    fn respond(self, output: ReconcileReport) -> Self {
        Self {
            report: Some(output),
            ..self
        }
    }
}

/// Remove everything and start from an empty registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearViewer {}

#[async_trait]
impl Execute for ClearViewer {
    type Output = ();

    async fn execute<V: ViewerFacade>(&self, session: &mut ViewerSession<V>) -> OperationResult<()> {
        session.clear_all()
    }

    fn respond(self, _: ()) -> Self {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetView {}

#[async_trait]
impl Execute for ResetView {
    type Output = ();

    async fn execute<V: ViewerFacade>(&self, session: &mut ViewerSession<V>) -> OperationResult<()> {
        Ok(session.viewer_mut().reset_view()?)
    }

    fn respond(self, _: ()) -> Self {
        self
    }
}

/// Add a representation over the selection, then register whatever it created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRepresentation {
    /// Style name such as `cartoon` or `ball-and-stick`
    pub representation: String,
    #[serde(default)]
    pub report: Option<ReconcileReport>,
}

impl AddRepresentation {
    pub fn new(representation: impl Into<String>) -> Self {
        Self {
            representation: representation.into(),
            report: None,
        }
    }
}

#[async_trait]
impl Execute for AddRepresentation {
    type Output = ReconcileReport;

    async fn execute<V: ViewerFacade>(
        &self,
        session: &mut ViewerSession<V>,
    ) -> OperationResult<ReconcileReport> {
        session
            .viewer_mut()
            .add_representation(&self.representation)
            .await?;
        Ok(session.reconcile(None)?)
    }

    fn respond(self, output: ReconcileReport) -> Self {
        Self {
            report: Some(output),
            ..self
        }
    }
}

/// Color the current selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl SetColor {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from a `#rrggbb` string
    pub fn from_hex(hex: &str) -> Result<Self, ColorParseError> {
        Ok(hex.parse::<Rgb>()?.into())
    }

    pub fn color(&self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }
}

impl From<Rgb> for SetColor {
    fn from(rgb: Rgb) -> Self {
        Self::new(rgb.r, rgb.g, rgb.b)
    }
}

#[async_trait]
impl Execute for SetColor {
    type Output = ();

    async fn execute<V: ViewerFacade>(&self, session: &mut ViewerSession<V>) -> OperationResult<()> {
        Ok(session.viewer_mut().set_color(self.color())?)
    }

    fn respond(self, _: ()) -> Self {
        self
    }
}
