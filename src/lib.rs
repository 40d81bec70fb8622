//! Clock Guard
//!
//! Checks the local clock against network time and enforces scheduled
//! workstation lock-outs, warning the user before each lock.

pub mod agent;
pub mod cli;
pub mod commands;
pub mod guard;
