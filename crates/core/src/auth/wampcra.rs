//! WAMP-CRA challenge signing, with optional PBKDF2 salted keys.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use wick_protocol::{AuthResponse, Challenge};

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_ITERATIONS: u32 = 1000;
pub const DEFAULT_KEY_LEN: usize = 32;

/// Upper bounds on the router-chosen PBKDF2 parameters.
pub const MAX_ITERATIONS: u64 = 1_000_000;
pub const MAX_KEY_LEN: u64 = 512;

/// `base64(HMAC-SHA256(key, challenge))`.
pub fn sign_challenge(challenge: &str, key: &[u8]) -> Result<String, AuthError> {
	let mut mac = HmacSha256::new_from_slice(key).map_err(|_| AuthError::InvalidParameter("key"))?;
	mac.update(challenge.as_bytes());
	Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// PBKDF2-HMAC-SHA256 of `secret`, base64-encoded. The encoded text is the signing key.
pub fn derive_key(secret: &str, salt: &str, iterations: u32, key_len: usize) -> String {
	let mut derived = vec![0u8; key_len];
	pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt.as_bytes(), iterations, &mut derived);
	BASE64.encode(derived)
}

pub fn respond(secret: &str, challenge: &Challenge) -> Result<AuthResponse, AuthError> {
	let text = challenge.extra_str("challenge").ok_or(AuthError::MissingField("challenge"))?;

	let signature = match challenge.extra_str("salt").filter(|salt| !salt.is_empty()) {
		None => sign_challenge(text, secret.as_bytes())?,
		Some(salt) => {
			let iterations = match challenge.extra_u64("iterations").filter(|n| *n > 0) {
				Some(n) if n <= MAX_ITERATIONS => u32::try_from(n).map_err(|_| AuthError::InvalidParameter("iterations"))?,
				Some(_) => return Err(AuthError::InvalidParameter("iterations")),
				None => DEFAULT_ITERATIONS,
			};
			let key_len = match challenge.extra_u64("keylen").filter(|n| *n > 0) {
				Some(n) if n <= MAX_KEY_LEN => usize::try_from(n).map_err(|_| AuthError::InvalidParameter("keylen"))?,
				Some(_) => return Err(AuthError::InvalidParameter("keylen")),
				None => DEFAULT_KEY_LEN,
			};
			let key = derive_key(secret, salt, iterations, key_len);
			sign_challenge(text, key.as_bytes())?
		}
	};
	Ok(AuthResponse::new(signature))
}
