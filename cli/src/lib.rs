//! bioscfg binary internals, exposed for tests.

pub mod app;
pub mod commands;
pub mod dispatch;
