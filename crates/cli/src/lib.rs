//! Command-line front end for wick.
//!
//! Parses flags, merges an optional profile, and hands one action to
//! [`wick::lifecycle::SessionController`].

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod profile;
