//! Tasktree library crate
//!
//! This library provides a tree of work items managed through a single
//! gateway, plus the command-line interface for the tasktree tool.

pub mod cli;
pub mod models;
pub mod snapshot;
