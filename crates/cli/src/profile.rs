//! Named connection profiles in `~/.wick/config`.
//!
//! The file is INI; each section is a profile:
//!
//! ```ini
//! [prod]
//! url = wss://router.example/ws
//! realm = prod
//! authid = deploy
//! authmethod = cryptosign
//! private-key = 9d61b19d...
//! ```
//!
//! `authmethod` picks which credential key is read (`private-key` for
//! `cryptosign`, `ticket`, or `secret` for `wampcra`); the others are
//! ignored.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use tracing::debug;
use wick::auth::{CRYPTOSIGN, CredentialSet, TICKET, WAMPCRA};

use crate::error::{CliError, Result};

pub const DEFAULT_URL: &str = "ws://localhost:8080/ws";
pub const DEFAULT_REALM: &str = "realm1";

const CONFIG_DIR: &str = ".wick";
const CONFIG_FILE: &str = "config";

#[derive(Debug, Default, Deserialize)]
struct Section {
	url: Option<String>,
	realm: Option<String>,
	authid: Option<String>,
	authrole: Option<String>,
	serializer: Option<String>,
	authmethod: Option<String>,
	#[serde(rename = "private-key")]
	private_key: Option<String>,
	ticket: Option<String>,
	secret: Option<String>,
}

/// One resolved profile section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
	pub url: String,
	pub realm: String,
	pub authid: Option<String>,
	pub authrole: Option<String>,
	pub serializer: Option<String>,
	pub private_key: Option<String>,
	pub ticket: Option<String>,
	pub secret: Option<String>,
}

impl Profile {
	pub fn credentials(&self) -> CredentialSet {
		CredentialSet::new(self.private_key.clone(), self.ticket.clone(), self.secret.clone())
	}

	fn from_section(name: &str, section: Section) -> Result<Self> {
		let present = |value: Option<String>| value.filter(|s| !s.is_empty());

		let mut profile = Self {
			url: present(section.url).unwrap_or_else(|| DEFAULT_URL.to_string()),
			realm: present(section.realm).unwrap_or_else(|| DEFAULT_REALM.to_string()),
			authid: present(section.authid),
			authrole: present(section.authrole),
			serializer: present(section.serializer),
			..Self::default()
		};

		match present(section.authmethod).as_deref() {
			None | Some("anonymous") => {}
			Some(CRYPTOSIGN) => profile.private_key = present(section.private_key),
			Some(TICKET) => profile.ticket = present(section.ticket),
			Some(WAMPCRA) => profile.secret = present(section.secret),
			Some(other) => {
				return Err(CliError::Profile(format!(
					"profile '{name}' has unknown authmethod '{other}' (expected anonymous, ticket, wampcra or cryptosign)"
				)));
			}
		}
		Ok(profile)
	}
}

/// Directory holding `.wick/config`: `$XDG_CONFIG_HOME` on Linux when set, otherwise the home directory.
pub fn config_base() -> Option<PathBuf> {
	#[cfg(target_os = "linux")]
	if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
		return Some(PathBuf::from(xdg));
	}
	dirs::home_dir()
}

pub fn config_path(base: &Path) -> PathBuf {
	base.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Reads profile `name` from `<base>/.wick/config`.
///
/// A missing file or section is an error. Section names match case-insensitively.
pub fn load(base: &Path, name: &str) -> Result<Profile> {
	let path = config_path(base);
	if !path.is_file() {
		return Err(CliError::Profile(format!("config file {} not found", path.display())));
	}
	debug!(target = "wick", path = %path.display(), profile = name, "loading profile");

	let settings = Config::builder()
		.add_source(File::from(path.as_path()).format(FileFormat::Ini))
		.build()
		.map_err(|source| CliError::Config {
			path: path.clone(),
			source,
		})?;

	let section = settings.get::<Section>(&name.to_lowercase()).map_err(|source| match source {
		ConfigError::NotFound(_) => CliError::Profile(format!("profile '{name}' not found in {}", path.display())),
		source => CliError::Config {
			path: path.clone(),
			source,
		},
	})?;
	Profile::from_section(name, section)
}
