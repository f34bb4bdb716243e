//! Authentication strategy resolution and challenge answering.
//!
//! A [`CredentialSet`] holds whatever the operator supplied. [`resolve`]
//! classifies it into exactly one [`AuthStrategy`], which in turn builds the
//! [`ClientConfig`] used to open the session:
//!
//! | supplied        | strategy            | method       |
//! |-----------------|---------------------|--------------|
//! | nothing         | `Anonymous`         | none         |
//! | private key     | `SignatureBased`    | `cryptosign` |
//! | ticket          | `Ticket`            | `ticket`     |
//! | secret          | `ChallengeResponse` | `wampcra`    |
//!
//! More than one credential is rejected as ambiguous.

mod cryptosign;
pub mod wampcra;

use std::fmt;
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tracing::{Span, debug, warn};
use wick_protocol::{AuthResponse, Challenge};
use wick_runtime::{AuthHandler, BoxError, ClientConfig, Serialization};

pub use cryptosign::SigningIdentity;

use crate::error::{Error, Result};

pub const CRYPTOSIGN: &str = "cryptosign";
pub const TICKET: &str = "ticket";
pub const WAMPCRA: &str = "wampcra";

/// Failure to answer a router challenge. Aborts the handshake.
#[derive(Debug, Error)]
pub enum AuthError {
	#[error("challenge is missing the '{0}' field")]
	MissingField(&'static str),

	#[error("challenge nonce is not valid hex: {0}")]
	ChallengeHex(hex::FromHexError),

	#[error("challenge carries an unusable '{0}' value")]
	InvalidParameter(&'static str),

	#[error("no credentials for auth method '{0}'")]
	NotConfigured(String),
}

/// Credentials as supplied by the operator. Empty strings count as absent.
#[derive(Clone, Default)]
pub struct CredentialSet {
	pub private_key: Option<String>,
	pub ticket: Option<String>,
	pub secret: Option<String>,
}

impl CredentialSet {
	pub fn new(private_key: Option<String>, ticket: Option<String>, secret: Option<String>) -> Self {
		Self {
			private_key,
			ticket,
			secret,
		}
	}

	fn present(value: &Option<String>) -> Option<&str> {
		value.as_deref().filter(|s| !s.is_empty())
	}

	/// Names of the credentials that are present.
	pub fn supplied(&self) -> Vec<&'static str> {
		[
			("private key", &self.private_key),
			("ticket", &self.ticket),
			("secret", &self.secret),
		]
		.into_iter()
		.filter(|(_, value)| Self::present(value).is_some())
		.map(|(name, _)| name)
		.collect()
	}
}

impl fmt::Debug for CredentialSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CredentialSet").field("supplied", &self.supplied()).finish()
	}
}

/// How this session authenticates. Built once, never mutated.
#[derive(Clone)]
pub enum AuthStrategy {
	Anonymous,
	Ticket(String),
	ChallengeResponse(String),
	SignatureBased(SigningIdentity),
}

impl fmt::Debug for AuthStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Anonymous => f.write_str("Anonymous"),
			Self::Ticket(_) => f.write_str("Ticket(<redacted>)"),
			Self::ChallengeResponse(_) => f.write_str("ChallengeResponse(<redacted>)"),
			Self::SignatureBased(identity) => f.debug_tuple("SignatureBased").field(identity).finish(),
		}
	}
}

/// Non-credential inputs for the session configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionParams {
	pub realm: String,
	pub serialization: Serialization,
	pub authid: Option<String>,
	pub authrole: Option<String>,
}

/// Classifies `credentials` into a strategy.
///
/// Fails on a malformed private key or when more than one credential is present.
pub fn resolve(credentials: &CredentialSet) -> Result<AuthStrategy> {
	let key = CredentialSet::present(&credentials.private_key);
	let ticket = CredentialSet::present(&credentials.ticket);
	let secret = CredentialSet::present(&credentials.secret);

	match (key, ticket, secret) {
		(None, None, None) => Ok(AuthStrategy::Anonymous),
		(Some(key), None, None) => Ok(AuthStrategy::SignatureBased(SigningIdentity::from_hex(key)?)),
		(None, Some(ticket), None) => Ok(AuthStrategy::Ticket(ticket.to_string())),
		(None, None, Some(secret)) => Ok(AuthStrategy::ChallengeResponse(secret.to_string())),
		_ => Err(Error::AmbiguousCredentials(credentials.supplied().join(" and "))),
	}
}

impl AuthStrategy {
	/// Auth method announced in HELLO, `None` for anonymous sessions.
	pub fn method(&self) -> Option<&'static str> {
		match self {
			Self::Anonymous => None,
			Self::Ticket(_) => Some(TICKET),
			Self::ChallengeResponse(_) => Some(WAMPCRA),
			Self::SignatureBased(_) => Some(CRYPTOSIGN),
		}
	}

	pub fn respond(&self, challenge: &Challenge) -> std::result::Result<AuthResponse, AuthError> {
		match self {
			Self::Anonymous => Err(AuthError::NotConfigured(challenge.method.clone())),
			Self::Ticket(ticket) => Ok(AuthResponse::new(ticket.clone())),
			Self::ChallengeResponse(secret) => wampcra::respond(secret, challenge),
			Self::SignatureBased(identity) => identity.respond(challenge),
		}
	}

	/// Builds the session configuration: HELLO details plus at most one challenge handler.
	///
	/// The handler logs inside `span`.
	pub fn session_config(&self, params: &SessionParams, span: &Span) -> ClientConfig {
		let mut config = ClientConfig::new(params.realm.clone(), params.serialization);

		if let Some(authid) = params.authid.as_deref().filter(|s| !s.is_empty()) {
			config.hello_details.insert("authid".to_string(), json!(authid));
		}
		if let Some(authrole) = params.authrole.as_deref().filter(|s| !s.is_empty()) {
			config.hello_details.insert("authrole".to_string(), json!(authrole));
		}
		if let Self::SignatureBased(identity) = self {
			config
				.hello_details
				.insert("authextra".to_string(), json!({ "pubkey": identity.public_key_hex() }));
		}

		if let Some(method) = self.method() {
			let strategy = self.clone();
			let span = span.clone();
			let handler: AuthHandler = Arc::new(move |challenge: &Challenge| {
				let _entered = span.enter();
				debug!(target = "wick.auth", method = %challenge.method, "answering challenge");
				strategy.respond(challenge).map_err(|err| {
					warn!(target = "wick.auth", error = %err, "cannot answer challenge");
					Box::new(err) as BoxError
				})
			});
			config.auth_handlers.insert(method.to_string(), handler);
		}

		config
	}
}
