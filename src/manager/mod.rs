// src/manager/mod.rs

//! Fleet coordinator.
//!
//! The [`JobManager`] is the only owner of the name → job table. Everything
//! that wants to change supervised state sends it an [`Action`] and waits
//! for the reply, so actions are applied strictly one after another.

pub mod action;
pub mod coordinator;
pub mod signals;

pub use action::{Action, ActionError, ActionResult, Command, ManagerHandle};
pub use coordinator::JobManager;
pub use signals::spawn_signal_bridge;
