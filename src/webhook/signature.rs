//! HMAC-SHA256 signatures over `message id ∥ timestamp ∥ raw body`.

// crates.io
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by the signature header.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Computes `sha256=<hex>` for one delivery.
pub fn sign(secret: &str, message_id: &str, timestamp: &str, body: &[u8]) -> Option<String> {
	let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;

	mac.update(message_id.as_bytes());
	mac.update(timestamp.as_bytes());
	mac.update(body);

	Some(format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes())))
}

/// Compares two strings without short-circuiting on the first differing byte.
pub fn constant_time_eq(expected: &str, provided: &str) -> bool {
	expected.len() == provided.len()
		&& expected
			.as_bytes()
			.iter()
			.zip(provided.as_bytes())
			.fold(0_u8, |acc, (a, b)| acc | (a ^ b))
			== 0
}
