//! Scenelink client
//!
//! Both ends of a broker that are not the broker itself: [`ControlClient`]
//! drives viewers over HTTP, [`ViewerLink`] attaches a [`ViewerSession`] to
//! the broker's response channel and publish leg.
//!
//! [`ViewerSession`]: scenelink_protocol::ViewerSession

pub mod control;
pub mod error;
pub mod events;
pub mod link;

pub use control::{
    ActionAck, BrokerHealth, ControlClient, Execution, RunReport, RunResponse, ViewerReply,
};
pub use error::{ClientError, ClientResult};
pub use events::{EventStream, SseDecoder, SseEvent};
pub use link::ViewerLink;
