use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, RngCore};
use tracing::{error, warn};

/// Hashes passwords mixed with a per-user hex salt that is stored next to the hash.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    salt_length: usize,
}

impl CredentialHasher {
    pub fn new(salt_length: usize) -> Self {
        Self { salt_length }
    }

    /// Returns `(hash, salt)`; both must be persisted.
    pub fn hash(&self, plain: &str) -> anyhow::Result<(String, String)> {
        let mut raw = vec![0u8; self.salt_length];
        OsRng.fill_bytes(&mut raw);
        let salt = hex::encode(raw);

        let phc_salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(format!("{plain}{salt}").as_bytes(), &phc_salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok((hash, salt))
    }

    /// Never errors; a malformed stored hash simply fails verification.
    pub fn verify(&self, candidate: &str, hash: &str, salt: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "stored password hash is malformed");
                return false;
            }
        };
        Argon2::default()
            .verify_password(format!("{candidate}{salt}").as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = CredentialHasher::new(16);
        let (hash, salt) = hasher.hash("Secur3P@ssw0rd!").expect("hashing should succeed");
        assert_eq!(salt.len(), 32);
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(hasher.verify("Secur3P@ssw0rd!", &hash, &salt));
    }

    #[test]
    fn salts_differ_per_call() {
        let hasher = CredentialHasher::new(8);
        let (h1, s1) = hasher.hash("same").unwrap();
        let (h2, s2) = hasher.hash("same").unwrap();
        assert_ne!(s1, s2);
        assert_ne!(h1, h2);
    }

    #[test]
    fn verify_rejects_mutations() {
        let hasher = CredentialHasher::new(16);
        let password = "correct-horse-battery-staple";
        let (hash, salt) = hasher.hash(password).unwrap();

        assert!(!hasher.verify("correct-horse-battery-staplf", &hash, &salt));
        assert!(!hasher.verify("Correct-horse-battery-staple", &hash, &salt));
        assert!(!hasher.verify(password, &hash, "00"));

        // flip one character of the encoded digest
        let mut chars: Vec<char> = hash.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let mutated: String = chars.into_iter().collect();
        assert!(!hasher.verify(password, &mutated, &salt));
    }

    #[test]
    fn verify_is_false_on_malformed_hash() {
        let hasher = CredentialHasher::new(16);
        assert!(!hasher.verify("anything", "not-a-valid-hash", "abcd"));
    }
}
