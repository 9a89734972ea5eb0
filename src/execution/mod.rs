//! Pipeline execution - controller, dispatch throttle and fan-out tracking

pub mod engine;
pub mod throttle;
pub mod tracker;

pub use engine::{EventHandler, PipelineController, PipelineHandle, ProvisionEvent};
pub use throttle::{StallPolicy, Throttle};
pub use tracker::FanOutTracker;
