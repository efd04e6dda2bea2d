//! Metric sinks for shield statistics.
//!
//! Diagnostics go through `tracing`; numeric counters go through a
//! [`MetricLogger`] so callers can route them to the console, keep them in
//! memory for assertions, or fan them out to several sinks.

mod console;
mod logger;
mod memory;

pub use console::ConsoleLogger;
pub use logger::{CompositeLogger, MetricLogger, NoOpLogger};
pub use memory::MemoryLogger;
