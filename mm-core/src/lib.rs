//! Core market-making control loop for a single spot pair: an event-driven
//! reactor that fuses a maker-venue depth/order stream with a reference-venue
//! depth stream, a pure fair-price/quoting model, and the ladder
//! reconciliation and depth-enforcement algorithms that keep a resting order
//! book shaped around that price.
//!
//! Wire protocols, SQL persistence, and environment/process lifecycle belong
//! to the binary crate and its external collaborators; this crate owns only
//! the decision logic and the state it operates on.

pub mod config;
pub mod depth_manager;
pub mod errors;
pub mod event_bus;
pub mod ladder;
pub mod logging;
pub mod model;
pub mod monitoring;
pub mod numeric;
pub mod pricer;
pub mod recorder;
pub mod supervisor;
pub mod venues;

pub use config::Config;
pub use errors::EngineError;
pub use event_bus::{EventReceiver, EventSender};
pub use supervisor::Supervisor;
