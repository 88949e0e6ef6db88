//! # Job Queue
//!
//! Bounded admission and tracking of long-running synchronization jobs.
//!
//! ## Components
//!
//! - [`BoundedJobQueue`]: FIFO admission, concurrency ceiling, hard timeout and
//!   retention of finished jobs
//! - [`JobContext`]: the explicit per-run context handed to every function that
//!   may log or issue a remote call
//! - [`Clock`]: time source for timestamps and retention, swappable in tests

pub mod clock;
pub mod context;
pub mod job;
pub mod job_queue;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{JobContext, JobLogSink};
pub use job::{Job, JobFailure, JobId, JobLogEntry, JobStatus, OperationKind};
pub use job_queue::{BoundedJobQueue, JobQueueSettings, QueueStats};
