//! The operation catalogue
//!
//! Every operation is a request struct whose result fields are filled in by
//! [`Execute::respond`] once it has run. The response therefore has the same
//! wire shape as the request.

mod scene;
mod script;
mod selection;
mod state;

pub use scene::{AddRepresentation, ClearViewer, LoadStructure, ResetView, SetColor};
pub use script::{RunScript, RunScriptAsync};
pub use selection::{
    FocusSelection, MakeSelection, PollSelection, SetPickingGranularity, ToggleSelectionMode,
};
pub use state::{GetState, Reconcile};

use crate::envelope::OperationKind;
use crate::error::OperationResult;
use crate::session::ViewerSession;
use crate::viewer::ViewerFacade;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An operation that can run against a viewer session
#[async_trait]
pub trait Execute: Sized + Send + Sync {
    /// Typed result of a successful run
    type Output: Send;

    async fn execute<V: ViewerFacade>(
        &self,
        session: &mut ViewerSession<V>,
    ) -> OperationResult<Self::Output>;

    /// Fold the result into the response payload
    fn respond(self, output: Self::Output) -> Self;
}

async fn run_one<O: Execute, V: ViewerFacade>(
    operation: O,
    session: &mut ViewerSession<V>,
) -> OperationResult<O> {
    let output = operation.execute(session).await?;
    Ok(operation.respond(output))
}

macro_rules! catalogue {
    ($($name:ident),+ $(,)?) => {
        /// Any operation, tagged on the wire by its `className`
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "className")]
        pub enum Operation {
            $($name($name),)+
        }

        impl Operation {
            pub fn kind(&self) -> OperationKind {
                match self {
                    $(Operation::$name(_) => OperationKind::$name,)+
                }
            }

            /// Execute against `session` and return the filled-in response
            pub async fn run<V: ViewerFacade>(
                self,
                session: &mut ViewerSession<V>,
            ) -> OperationResult<Operation> {
                match self {
                    $(Operation::$name(op) => run_one(op, session).await.map(Operation::$name),)+
                }
            }
        }

        $(
            impl From<$name> for Operation {
                fn from(op: $name) -> Self {
                    Operation::$name(op)
                }
            }
        )+
    };
}

catalogue!(
    RunScript,
    RunScriptAsync,
    GetState,
    PollSelection,
    MakeSelection,
    LoadStructure,
    ClearViewer,
    ResetView,
    FocusSelection,
    ToggleSelectionMode,
    SetPickingGranularity,
    AddRepresentation,
    SetColor,
    Reconcile,
);
