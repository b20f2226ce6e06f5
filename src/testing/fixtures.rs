use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

/// Small key, fast enough to generate per test.
pub fn test_private_key() -> RsaPrivateKey {
    let mut rng = rsa::rand_core::OsRng;
    RsaPrivateKey::new(&mut rng, 1024).unwrap()
}

/// Serialize a public key the way adbd stores `adbkey.pub`.
///
/// `n0inv` and `rr` are left zeroed, parsing never looks at them.
pub fn adb_public_key_blob(key: &RsaPublicKey) -> Vec<u8> {
    let mut modulus = key.n().to_bytes_le();
    let words = modulus.len().div_ceil(4);
    modulus.resize(words * 4, 0);
    let exponent = key.e().to_bytes_le();
    let mut e_bytes = [0u8; 4];
    e_bytes[..exponent.len()].copy_from_slice(&exponent);

    let mut blob = Vec::with_capacity(4 + 4 + words * 8 + 4);
    blob.extend_from_slice(&(words as u32).to_le_bytes());
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob.extend_from_slice(&modulus);
    blob.extend(std::iter::repeat(0u8).take(words * 4));
    blob.extend_from_slice(&e_bytes);
    blob
}

/// Text form: base64 struct, space, comment.
pub fn adb_public_key_text(key: &RsaPublicKey, comment: &str) -> String {
    format!("{} {}", STANDARD.encode(adb_public_key_blob(key)), comment)
}
