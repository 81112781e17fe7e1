//! `relay-scheduler`: named periodic jobs on independent Tokio timers.
//!
//! # Overview
//!
//! Jobs are registered with [`engine::Scheduler::add_job`] and live only in
//! memory. Each running job owns one Tokio task that waits for either the next
//! tick of its interval or its cancellation token, and awaits the job's
//! [`task::Task`] inline, so a job never overlaps itself.
//!
//! # Job lifecycle
//!
//! | Operation      | Idle                 | Running                          |
//! |----------------|----------------------|----------------------------------|
//! | `start_job`    | → Running            | `AlreadyRunning`                 |
//! | `stop_job`     | `NotRunning`         | cancel, loop exits on its own    |
//! | `restart_job`  | → Running            | cancel, await exit, → Running    |
//! | `remove_job`   | unregistered         | cancel, unregistered             |
//! | `stop`         | no-op                | cancel, await exit               |

pub mod engine;
pub mod error;
pub mod task;
pub mod types;

pub use engine::Scheduler;
pub use error::{Result, SchedulerError};
pub use task::{FnTask, JobContext, Task};
pub use types::{JobInfo, JobState};
