#[macro_use]
extern crate aggo_core;

pub mod error;
pub mod lifecycle;
mod notice_task;
pub mod persist;
pub mod receiver;
pub mod sink;
pub mod tracing_init;
