//! Core of the wick WAMP command-line client.
//!
//! * [`auth`]: turns supplied credentials into a session configuration and answers challenges
//! * [`coerce`]: types command-line strings into payloads and renders payloads back
//! * [`lifecycle`]: connects, runs one action, and tears the session down
//! * [`dispatcher`]: answers invocations of a registered procedure with shell commands
//!
//! The WAMP session itself is reached through [`wick_runtime::Session`].

pub mod auth;
pub mod coerce;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod output;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
