// Volume screening, stream subscription ownership and the lifecycle that ties them together
pub mod orchestrator;
pub mod subscription_controller;
pub mod volume_gate;

pub use orchestrator::{MonitorOrchestrator, MonitorState, ReevaluationReport, SeedReport};
pub use subscription_controller::SubscriptionController;
pub use volume_gate::{VolumeGate, VolumeScreening};
