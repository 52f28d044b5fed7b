#![forbid(unsafe_code)]

//! Dockview Runtime
//!
//! A small Elm-style runtime: models receive messages, return commands, and
//! declare subscriptions. Blocking work (log and status fetches) runs as
//! background tasks whose results come back as messages, so all state
//! changes happen on the update loop.
//!
//! # Key Components
//!
//! - [`Program`] - Headless update loop
//! - [`Model`] - Application state and behavior
//! - [`Cmd`] - Side effects returned from `update`
//! - [`Subscription`] / [`Every`] - Long-running message sources
//! - [`ProgramSimulator`] - Deterministic test driver

pub mod program;
pub mod simulator;
pub mod subscription;

pub use program::{Cmd, Model, Program, ProgramConfig, TaskSpec};
pub use simulator::{CmdRecord, ProgramSimulator, TaskMode};
pub use subscription::{Every, StopSignal, SubId, Subscription};
