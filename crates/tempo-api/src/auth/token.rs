//! Personal access token helpers (generate and hash access tokens).

pub const ACCESS_TOKEN_PREFIX: &str = "tp_live_";

/// Generate a secure personal access token
pub fn generate_access_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.random()).collect();
    let random_part = hex::encode(random_bytes);

    // Format: tp_live_<64 hex chars>
    format!("{}{}", ACCESS_TOKEN_PREFIX, random_part)
}

/// Hash an access token for storage.
///
/// The digest is deterministic so authentication resolves a presented token
/// with a single indexed lookup on the stored hash.
pub fn hash_access_token(token: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
