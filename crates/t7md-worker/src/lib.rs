//! Headless runner for the T7MD frame pipeline.
//!
//! Processes one video from the command line and reports on stdout with a
//! line protocol a host application can parse:
//! - `PROGRESS|<percent>` whenever the percentage increases
//! - `SUCCESS|<metadata log path>` on completion
//! - `ERROR|<reason>` on failure or interruption

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod runner;

pub use cli::{default_run_name, HeadlessArgs, HEADLESS_RUN_SUFFIX};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::init_tracing;
pub use protocol::{ProtocolLine, ProtocolWriter};
pub use runner::{build_engine, forward_events, load_config, run_headless};
