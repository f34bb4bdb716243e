//! WAMP session client used by wick.
//!
//! The core crate talks to a router only through the [`Session`] and
//! [`Connector`] traits defined here. [`WampConnector`] is the bundled
//! implementation: a client-side WAMP v2 session over WebSocket or RawSocket
//! with JSON, MessagePack or CBOR serialization.
//!
//! [`process`] provides the shell and program execution facility the callee
//! role uses to answer invocations.

pub mod client;
pub mod error;
pub mod process;
pub mod serializer;
pub mod session;
pub mod transport;

pub use client::{Client, WampConnector};
pub use error::{Error, Result};
pub use serializer::Serialization;
pub use session::{AuthHandler, BoxError, ClientConfig, Connector, EventHandler, InvocationHandler, Session};
