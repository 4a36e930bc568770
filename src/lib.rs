//! Batch document-to-text conversion.
//!
//! [`discovery`] turns an input tree into tasks, [`scheduler`] runs them on a
//! bounded worker pool using extractors looked up in a [`registry::Registry`],
//! and [`report`] reduces the results into a summary. [`pipeline`] wires the
//! three together for the binary.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod postprocess;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod util;

pub use config::{Config, DegradedPolicy, MAX_CONCURRENCY, RunConfig};
pub use discovery::{Discovery, Task};
pub use engine::Extractor;
pub use error::{DiscoveryError, ErrorKind, ExtractionError, TaskError};
pub use monitor::{MemoryStatus, ResourceMonitor};
pub use registry::Registry;
pub use report::{Report, aggregate, render};
pub use scheduler::{BatchOutcome, CancelFlag, ConversionResult, ProgressObserver, Scheduler};
