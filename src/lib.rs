//! Agent Zoo - several language-model agents sharing one transcript
//!
//! A driver process schedules turns between configured agents, breaks
//! "everyone passed" deadlocks and stays in sync with a separately running
//! control panel through a handful of files in a session directory.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod control;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod scheduler;
pub mod state_machine;
pub mod store;
