mod actors;
pub mod error;
mod events;
pub mod launch;
pub mod pipeline;
pub mod runner;
pub mod types;

// re-export the job coord handle as if it is the job coordinator itself.
pub use actors::coordinator::JobCoordinatorHandle as JobCoordinator;
pub use events::JobStatus;
pub use launch::{ContainerEngine, Isolation, PullPolicy, RunOptions};
pub use pipeline::Pipeline;
pub use runner::{JobOutput, JobResult, JobRunner, OutputSink};
pub use types::JobSpec;
