//! ADB public keys, as found in `adbkey.pub` and in `AUTH` packets.
//!
//! The key is a base64 encoded little-endian struct:
//!
//! ```text
//! u32 len          length of n in 32 bit words
//! u32 n0inv        -1 / n[0] mod 2^32
//! u32 n[len]       modulus
//! u32 rr[len]      R^2 mod n
//! u32 exponent     3 or 65537
//! ```
//!
//! optionally followed by a NUL and a space separated comment.

use crate::error::{AdbError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use lazy_static::lazy_static;
use md5::{Digest, Md5};
use regex::Regex;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;

lazy_static! {
    static ref RE_PUBLIC_KEY: Regex = Regex::new(
        r"^((?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?)\x00?( .*|)\s*$"
    )
    .unwrap();
}

/// Comment used for OpenSSH output.
const OPENSSH_COMMENT: &str = "adbkey";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdbPublicKey {
    key: RsaPublicKey,
    fingerprint: String,
    comment: String,
}

impl AdbPublicKey {
    pub fn key(&self) -> &RsaPublicKey {
        &self.key
    }

    /// MD5 of the raw struct, as colon separated lowercase hex.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Check `signature` over `token`, which adbd signs as if it were a SHA-1 digest.
    pub fn verify(&self, token: &[u8], signature: &[u8]) -> bool {
        self.key
            .verify(Pkcs1v15Sign::new::<Sha1>(), token, signature)
            .is_ok()
    }

    /// SubjectPublicKeyInfo PEM.
    pub fn to_pem(&self) -> Result<String> {
        self.key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AdbError::InvalidPublicKey(e.to_string()))
    }

    /// `ssh-rsa <base64> adbkey`
    pub fn to_openssh(&self) -> String {
        let mut blob = Vec::new();
        put_ssh_string(&mut blob, b"ssh-rsa");
        put_ssh_string(&mut blob, &mpint(self.key.e()));
        put_ssh_string(&mut blob, &mpint(self.key.n()));
        format!("ssh-rsa {} {}", STANDARD.encode(blob), OPENSSH_COMMENT)
    }
}

fn put_ssh_string(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

/// Big-endian two's complement, positive.
fn mpint(value: &BigUint) -> Vec<u8> {
    let mut bytes = value.to_bytes_be();
    if bytes.first().is_some_and(|&b| b & 0x80 != 0) {
        bytes.insert(0, 0);
    }
    bytes
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn invalid() -> AdbError {
    AdbError::InvalidPublicKey("Invalid public key".to_string())
}

/// Parse the text form of an ADB public key.
pub fn parse_public_key(text: &str) -> Result<AdbPublicKey> {
    let captures = RE_PUBLIC_KEY.captures(text).ok_or_else(|| {
        AdbError::InvalidPublicKey("Unrecognizable public key format".to_string())
    })?;
    let blob = STANDARD.decode(&captures[1]).map_err(|_| invalid())?;
    read_public_key_struct(&blob, captures[2].trim())
}

/// Decode the binary struct form.
pub fn read_public_key_struct(blob: &[u8], comment: &str) -> Result<AdbPublicKey> {
    if blob.len() < 4 {
        return Err(invalid());
    }
    let len = read_u32(blob, 0) as usize * 4;
    if blob.len() != 4 + 4 + len + len + 4 {
        return Err(invalid());
    }
    // n0inv and rr are precomputations for the device side
    let n = BigUint::from_bytes_le(&blob[8..8 + len]);
    let e = read_u32(blob, 8 + len + len);
    if e != 3 && e != 65537 {
        return Err(AdbError::InvalidPublicKey(format!(
            "Invalid exponent {}, only 3 and 65537 are supported",
            e
        )));
    }
    let key = RsaPublicKey::new(n, BigUint::from(e))
        .map_err(|e| AdbError::InvalidPublicKey(e.to_string()))?;

    let fingerprint = Md5::digest(blob)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":");

    Ok(AdbPublicKey {
        key,
        fingerprint,
        comment: comment.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{adb_public_key_blob, adb_public_key_text, test_private_key};
    use rsa::RsaPublicKey;

    #[test]
    fn test_parse_round_trips_key() {
        let private = test_private_key();
        let public = RsaPublicKey::from(&private);
        let parsed = parse_public_key(&adb_public_key_text(&public, "me@host")).unwrap();
        assert_eq!(parsed.key(), &public);
        assert_eq!(parsed.comment(), "me@host");
    }

    #[test]
    fn test_parse_with_nul_and_newline() {
        let public = RsaPublicKey::from(&test_private_key());
        let text = format!(
            "{}\0 unknown@unknown\n",
            STANDARD.encode(adb_public_key_blob(&public))
        );
        let parsed = parse_public_key(&text).unwrap();
        assert_eq!(parsed.comment(), "unknown@unknown");
    }

    #[test]
    fn test_fingerprint_is_md5_of_struct() {
        let public = RsaPublicKey::from(&test_private_key());
        let blob = adb_public_key_blob(&public);
        let parsed = read_public_key_struct(&blob, "").unwrap();
        let fingerprint = parsed.fingerprint();
        assert_eq!(fingerprint.len(), 16 * 3 - 1);
        assert!(fingerprint
            .split(':')
            .all(|part| part.len() == 2 && part == part.to_lowercase()));
        assert_eq!(
            fingerprint.replace(':', ""),
            Md5::digest(&blob)
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<String>()
        );
    }

    #[test]
    fn test_rejects_bad_length() {
        let public = RsaPublicKey::from(&test_private_key());
        let mut blob = adb_public_key_blob(&public);
        blob.push(0);
        assert_eq!(
            read_public_key_struct(&blob, "").unwrap_err().to_string(),
            "Invalid public key"
        );
    }

    #[test]
    fn test_rejects_bad_exponent() {
        let public = RsaPublicKey::from(&test_private_key());
        let mut blob = adb_public_key_blob(&public);
        let at = blob.len() - 4;
        blob[at..].copy_from_slice(&5u32.to_le_bytes());
        assert!(read_public_key_struct(&blob, "")
            .unwrap_err()
            .to_string()
            .contains("Invalid exponent 5"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_public_key("not a key!").is_err());
    }

    #[test]
    fn test_verify_signature() {
        let private = test_private_key();
        let public = RsaPublicKey::from(&private);
        let parsed = read_public_key_struct(&adb_public_key_blob(&public), "").unwrap();
        let token = [7u8; 20];
        let signature = private.sign(Pkcs1v15Sign::new::<Sha1>(), &token).unwrap();
        assert!(parsed.verify(&token, &signature));
        assert!(!parsed.verify(&[8u8; 20], &signature));
    }

    #[test]
    fn test_openssh_format() {
        let public = RsaPublicKey::from(&test_private_key());
        let parsed = read_public_key_struct(&adb_public_key_blob(&public), "").unwrap();
        let openssh = parsed.to_openssh();
        assert!(openssh.starts_with("ssh-rsa AAAAB3NzaC1yc2E"));
        assert!(openssh.ends_with(" adbkey"));
        assert!(parsed.to_pem().unwrap().starts_with("-----BEGIN PUBLIC KEY-----"));
    }
}
