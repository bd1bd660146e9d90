//! Tool System - kubectl/helm adapters, registry validation and routing

mod definition;
mod helm;
mod kubectl;
mod router;

pub use definition::{BinaryStatus, TimeoutArg, ToolId, definitions, probe_binaries, validate_definitions};
pub use helm::HelmArgs;
pub use kubectl::KubectlArgs;
pub use router::{KubeToolRouter, ToolOutcome, ToolRouter};
