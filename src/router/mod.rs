//! Routing of simulator requests.
//!
//! A request is turned into a [`Route`] from its query, its body is decoded
//! into a [`Job`] for that route, and only then does the [`Dispatcher`] apply
//! the first-cycle reset and run the job.

mod dispatch;
mod params;

pub use dispatch::{Dispatcher, Job, Reset, Route};
pub use params::{Mode, RequestParams, TaskType};
