//! Password digests and the roast table.
//!
//! Two MD5 digest layouts coexist for client compatibility: the weak form
//! (clients 3.5-4.7, and the roasted sign-on path of 1.x-3.0) hashes the
//! plaintext password, the strong form (4.8-5.9) hashes an inner MD5 of the
//! password. Both mix in the per-user salt and a fixed suffix string.

use md5::{Digest, Md5};

/// Suffix mixed into every AIM password digest.
pub const AIM_MD5_STRING: &[u8] = b"AOL Instant Messenger (SM)";

/// XOR table applied by old clients to "roast" the plaintext password in the
/// FLAP sign-on frame.
pub const ROAST_TABLE: [u8; 16] = [
    0xF3, 0x26, 0x81, 0xC4, 0x39, 0x86, 0xDB, 0x92, 0x71, 0xA3, 0xB9, 0xE6, 0x53, 0x7A, 0x95,
    0x7C,
];

/// Roasting is an involution: applying it twice yields the input.
pub fn roast_password(password: &[u8]) -> Vec<u8> {
    password
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ ROAST_TABLE[i % ROAST_TABLE.len()])
        .collect()
}

/// `MD5(password || salt || AIM_MD5_STRING)`
pub fn weak_md5_digest(password: &str, salt: &str) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(AIM_MD5_STRING);
    hasher.finalize().to_vec()
}

/// `MD5(MD5(password) || salt || AIM_MD5_STRING)`
pub fn strong_md5_digest(password: &str, salt: &str) -> Vec<u8> {
    let inner = Md5::digest(password.as_bytes());
    let mut hasher = Md5::new();
    hasher.update(inner);
    hasher.update(salt.as_bytes());
    hasher.update(AIM_MD5_STRING);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_digest_known_vector() {
        assert_eq!(
            hex::encode(weak_md5_digest("pw", "s")),
            "14fa6d2714d37e32302e8d159655f9c9"
        );
    }

    #[test]
    fn strong_digest_known_vector() {
        assert_eq!(
            hex::encode(strong_md5_digest("pw", "s")),
            "bf0dfff2c9e0db4e6acdf34a1049428f"
        );
    }

    #[test]
    fn stub_password_vectors() {
        assert_eq!(
            hex::encode(weak_md5_digest("welcome1", "salt123")),
            "06e04ae56cebebcae1dcba23639a1771"
        );
        assert_eq!(
            hex::encode(strong_md5_digest("welcome1", "salt123")),
            "40c49d12cf8dc563d58557c53d74348d"
        );
    }

    #[test]
    fn roast_is_an_involution() {
        let pass = b"welcome1";
        let roasted = roast_password(pass);
        assert_eq!(hex::encode(&roasted), "8443eda756ebbea3");
        assert_eq!(roast_password(&roasted), pass);
    }
}
