//! Feed ingestion: scheduling, the job queue and the worker.
//!
//! One [`Planner`] task per source pushes [`Job`]s into a bounded queue. A
//! single [`Worker`] drains the queue and runs cycles strictly one at a time.

mod job;
mod planner;
mod worker;

pub use job::{job_queue, Job, JobReceiver, JobSender};
pub use planner::Planner;
pub use worker::{CycleReport, Worker, DEFAULT_BOOTSTRAP_LOOKBACK};
