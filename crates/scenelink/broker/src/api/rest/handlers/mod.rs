//! API request handlers

mod events;
mod health;
mod relay;
mod ws;

pub use events::*;
pub use health::*;
pub use relay::*;
pub use ws::*;
