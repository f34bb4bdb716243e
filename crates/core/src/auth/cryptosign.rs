//! WAMP-Cryptosign (Ed25519) identity.

use std::fmt;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use wick_protocol::{AuthResponse, Challenge};

use super::AuthError;
use crate::error::{Error, Result};

const SEED_LEN: usize = 32;

/// Ed25519 signing key plus its hex-encoded public key.
#[derive(Clone)]
pub struct SigningIdentity {
	key: SigningKey,
	public_hex: String,
}

impl SigningIdentity {
	/// Builds an identity from a hex private key.
	///
	/// 32 bytes are the seed. 64 bytes are a seed followed by the public
	/// key; only the seed is used. Any other length is rejected.
	pub fn from_hex(private_key: &str) -> Result<Self> {
		let bytes = hex::decode(private_key.trim())?;
		if bytes.len() != SEED_LEN && bytes.len() != 2 * SEED_LEN {
			return Err(Error::InvalidPrivateKeyLength(bytes.len()));
		}
		let mut seed = [0u8; SEED_LEN];
		seed.copy_from_slice(&bytes[..SEED_LEN]);

		let key = SigningKey::from_bytes(&seed);
		let public_hex = hex::encode(key.verifying_key().as_bytes());
		Ok(Self { key, public_hex })
	}

	pub fn public_key_hex(&self) -> &str {
		&self.public_hex
	}

	pub fn verifying_key(&self) -> VerifyingKey {
		self.key.verifying_key()
	}

	/// Signs the hex nonce in `challenge.extra["challenge"]`.
	///
	/// The response is the hex signature followed by the nonce hex as received.
	pub fn respond(&self, challenge: &Challenge) -> std::result::Result<AuthResponse, AuthError> {
		let nonce_hex = challenge.extra_str("challenge").ok_or(AuthError::MissingField("challenge"))?;
		let nonce = hex::decode(nonce_hex).map_err(AuthError::ChallengeHex)?;
		let signature = self.key.sign(&nonce);
		Ok(AuthResponse::new(format!("{}{}", hex::encode(signature.to_bytes()), nonce_hex)))
	}
}

impl fmt::Debug for SigningIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SigningIdentity")
			.field("public_key", &self.public_hex)
			.field("private_key", &"<redacted>")
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ed25519_dalek::{Signature, Verifier};
	use serde_json::json;

	const SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
	const PUBLIC: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
	const SIGNATURE: &str = "281d28ec6303cc9abab81e64d14a4775e53b6bc2f9d9b627c3fe049c8e82aa3f\
		26f70e8414acf2220191da50e145bd2e891c85a7ed55bcf9bea56a3e9b149305";

	fn challenge(nonce: &str) -> Challenge {
		Challenge::new("cryptosign", json!({ "challenge": nonce }).as_object().cloned().unwrap_or_default())
	}

	#[test]
	fn seed_derives_known_public_key() {
		let identity = SigningIdentity::from_hex(SEED).unwrap();
		assert_eq!(identity.public_key_hex(), PUBLIC);
	}

	#[test]
	fn sixty_four_byte_key_uses_seed_prefix() {
		let expanded = format!("{SEED}{PUBLIC}");
		let identity = SigningIdentity::from_hex(&expanded).unwrap();
		assert_eq!(identity.public_key_hex(), PUBLIC);

		let garbage_tail = format!("{SEED}{}", "ff".repeat(32));
		assert_eq!(SigningIdentity::from_hex(&garbage_tail).unwrap().public_key_hex(), PUBLIC);
	}

	#[test]
	fn rejects_other_lengths() {
		let short = "ab".repeat(31);
		assert!(matches!(SigningIdentity::from_hex(&short), Err(Error::InvalidPrivateKeyLength(31))));
		assert!(matches!(SigningIdentity::from_hex(""), Err(Error::InvalidPrivateKeyLength(0))));
		assert!(matches!(SigningIdentity::from_hex("zz"), Err(Error::InvalidPrivateKeyHex(_))));
	}

	#[test]
	fn response_is_signature_then_challenge() {
		let identity = SigningIdentity::from_hex(SEED).unwrap();
		let response = identity.respond(&challenge("deadbeef")).unwrap();

		assert_eq!(response.signature, format!("{SIGNATURE}deadbeef"));
		assert!(response.extra.is_empty());

		let sig_bytes = hex::decode(&response.signature[..128]).unwrap();
		let signature = Signature::from_slice(&sig_bytes).unwrap();
		assert!(identity.verifying_key().verify(&[0xde, 0xad, 0xbe, 0xef], &signature).is_ok());
	}

	#[test]
	fn malformed_challenges_are_errors() {
		let identity = SigningIdentity::from_hex(SEED).unwrap();
		assert!(matches!(identity.respond(&challenge("not-hex")), Err(AuthError::ChallengeHex(_))));
		assert!(matches!(
			identity.respond(&Challenge::new("cryptosign", Default::default())),
			Err(AuthError::MissingField("challenge"))
		));
	}

	#[test]
	fn debug_output_hides_key_material() {
		let rendered = format!("{:?}", SigningIdentity::from_hex(SEED).unwrap());
		assert!(rendered.contains(PUBLIC));
		assert!(!rendered.contains(SEED));
	}
}
