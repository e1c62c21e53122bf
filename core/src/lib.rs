//! Task execution engine for the bioscfg worker.
//!
//! A task envelope arrives from the work queue, is converted into a
//! [`task::BiosControlTask`], and is executed by the [`runner::TaskRunner`]
//! as an ordered list of steps against a [`bmc::BmcSession`]. Progress is
//! reported through a [`runner::StatusPublisher`] after every transition.

pub mod bmc;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod inventory;
pub mod model;
pub mod runner;
pub mod task;

pub use context::Services;
pub use error::{BmcError, WorkerError};
pub use handler::{TaskHandler, TaskReport};
