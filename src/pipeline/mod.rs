pub mod channel;
pub mod orchestrator;
pub mod runner;
pub mod stats;

pub use channel::{create_channel, SharedReceiver, Sender};
pub use orchestrator::{Pipeline, PipelineError, PipelineHandle};
pub use runner::{run_parser, run_writer, WorkerError, WriterSettings};
pub use stats::{PipelineStats, StatsSnapshot};
