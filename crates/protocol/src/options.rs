//! Option keys, well-known URIs and role details.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::Dict;

pub const OPT_MATCH: &str = "match";
pub const OPT_ACKNOWLEDGE: &str = "acknowledge";

pub const CLOSE_REALM: &str = "wamp.close.close_realm";
pub const GOODBYE_AND_OUT: &str = "wamp.close.goodbye_and_out";
pub const ERROR_NO_SUCH_REGISTRATION: &str = "wamp.error.no_such_registration";
pub const ERROR_CANNOT_AUTHENTICATE: &str = "wamp.error.cannot_authenticate";
pub const ERROR_PROTOCOL_VIOLATION: &str = "wamp.error.protocol_violation";

/// Topic matching policy for SUBSCRIBE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
	#[default]
	Exact,
	Prefix,
	Wildcard,
}

impl MatchPolicy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Exact => "exact",
			Self::Prefix => "prefix",
			Self::Wildcard => "wildcard",
		}
	}

	/// SUBSCRIBE options for this policy. Exact matching is the router default and sends no option.
	pub fn subscribe_options(self) -> Dict {
		let mut options = Dict::new();
		if self != Self::Exact {
			options.insert(OPT_MATCH.to_string(), json!(self.as_str()));
		}
		options
	}
}

impl fmt::Display for MatchPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for MatchPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"exact" => Ok(Self::Exact),
			"prefix" => Ok(Self::Prefix),
			"wildcard" => Ok(Self::Wildcard),
			other => Err(format!("unknown match policy '{other}' (expected exact, prefix or wildcard)")),
		}
	}
}

/// PUBLISH options requesting a PUBLISHED acknowledgement.
pub fn acknowledged() -> Dict {
	let mut options = Dict::new();
	options.insert(OPT_ACKNOWLEDGE.to_string(), json!(true));
	options
}

/// Returns `true` when PUBLISH options ask for an acknowledgement.
pub fn wants_acknowledge(options: &Dict) -> bool {
	options.get(OPT_ACKNOWLEDGE).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Client role announcement carried in HELLO details.
pub fn client_roles() -> Dict {
	let roles = json!({
		"publisher": {"features": {}},
		"subscriber": {"features": {"pattern_based_subscription": true}},
		"caller": {"features": {}},
		"callee": {"features": {}},
	});
	roles.as_object().cloned().unwrap_or_default()
}
