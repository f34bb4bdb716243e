//! Wire types for the WAMP v2 protocol.
//!
//! This crate contains the message shapes wick exchanges with a router.
//! Every message is a positional list whose first element is a numeric
//! type code; [`Message`] converts between that list form and a typed enum.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: no I/O, no session state
//! * Client-side only: the messages a publisher, subscriber, caller and callee need
//! * Serializer-agnostic: everything goes through [`serde_json::Value`]
//!
//! Session behavior lives in `wick-runtime`.

pub mod message;
pub mod options;
pub mod types;

pub use message::*;
pub use options::*;
pub use types::*;
