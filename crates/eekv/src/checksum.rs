//! SHA-256 payload checksums in their on-device hex form.

use std::fmt;

use sha2::{Digest, Sha256};

/// Length of the checksum field in the trailer (lowercase hex SHA-256).
pub const CHECKSUM_HEX_LEN: usize = 64;

/// SHA-256 digest of a payload's text.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Computes the checksum of the given text bytes.
    pub fn compute(text: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text);
        Self(hasher.finalize().into())
    }

    /// Parses the on-device field. Only lowercase hex is accepted.
    pub fn from_hex(field: &[u8]) -> Option<Self> {
        if field.len() != CHECKSUM_HEX_LEN
            || !field
                .iter()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
        {
            return None;
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(field, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    /// Returns the lowercase hex encoding written to the trailer.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", &self.to_hex()[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            Checksum::compute(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hex_roundtrip() {
        let sum = Checksum::compute(b"{\"k\":\"v\"}");
        let hex = sum.to_hex();
        assert_eq!(hex.len(), CHECKSUM_HEX_LEN);
        assert_eq!(Checksum::from_hex(hex.as_bytes()), Some(sum));
    }

    #[test]
    fn rejects_uppercase_and_short_fields() {
        let hex = Checksum::compute(b"x").to_hex().to_uppercase();
        assert_eq!(Checksum::from_hex(hex.as_bytes()), None);
        assert_eq!(Checksum::from_hex(b"abc"), None);
        assert_eq!(Checksum::from_hex(&[0u8; CHECKSUM_HEX_LEN]), None);
    }
}
