//! Secret diffing against hashed remote secrets
//!
//! The platform only returns argon2 hashes of stored secrets, so "unchanged"
//! is decided by verifying the declared plaintext against the stored hash.
//! Unchanged secrets are never re-sent.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use regex::Regex;
use tracing::{debug, warn};

use stratus_common::model::{HashedSecret, SecretEnvVar};

/// `${NAME}` as the whole value
static ENV_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{([^}]*)\}$").expect("valid env reference regex"));

/// One-way check of a plaintext against a stored hash
pub trait SecretVerifier: Send + Sync {
    /// True when `plaintext` hashes to `hash`. An unparsable hash is a mismatch.
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// Verifies argon2 PHC strings
#[derive(Clone, Copy, Debug, Default)]
pub struct Argon2Verifier;

impl SecretVerifier for Argon2Verifier {
    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                debug!(error = %e, "stored secret hash is not a PHC string");
                false
            }
        }
    }
}

/// Environment lookup used to resolve `${NAME}` references
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Computes secret mutations for create and update payloads
#[derive(Clone)]
pub struct SecretDiffer {
    verifier: Arc<dyn SecretVerifier>,
    env: EnvLookup,
}

impl SecretDiffer {
    /// Differ with an explicit verifier and environment
    pub fn new(verifier: Arc<dyn SecretVerifier>, env: EnvLookup) -> Self {
        Self { verifier, env }
    }

    /// Argon2 verification against the process environment
    pub fn from_process_env() -> Self {
        Self::new(
            Arc::new(Argon2Verifier),
            Arc::new(|name| std::env::var(name).ok()),
        )
    }

    /// Resolve `${NAME}` references. A reference to an unset variable drops
    /// the secret: it will not be created, and an existing one is deleted.
    pub fn resolve(&self, declared: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        declared
            .iter()
            .filter_map(|(key, value)| {
                let Some(caps) = ENV_REFERENCE.captures(value) else {
                    return Some((key.clone(), value.clone()));
                };
                let var = &caps[1];
                match (self.env)(var) {
                    Some(resolved) => Some((key.clone(), resolved)),
                    None => {
                        warn!(
                            env_var = %var,
                            secret = %key,
                            "Env var {var} used in secret {key} does not exist: this secret will not be created"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Full secret list for a create payload
    pub fn initial(&self, declared: &BTreeMap<String, String>) -> Vec<SecretEnvVar> {
        self.resolve(declared)
            .into_iter()
            .map(|(k, v)| SecretEnvVar::set(k, v))
            .collect()
    }

    /// Minimal mutations turning `existing` into `declared`.
    ///
    /// Existing keys come first in their remote order (delete or set), then
    /// new keys in name order.
    pub fn diff(
        &self,
        existing: &[HashedSecret],
        declared: &BTreeMap<String, String>,
    ) -> Vec<SecretEnvVar> {
        let mut desired: HashMap<String, String> = self.resolve(declared).into_iter().collect();
        let mut mutations = Vec::new();

        for secret in existing {
            match desired.remove(&secret.key) {
                None => mutations.push(SecretEnvVar::delete(&secret.key)),
                Some(value) => {
                    if !self.verifier.verify(&value, &secret.hashed_value) {
                        mutations.push(SecretEnvVar::set(&secret.key, value));
                    }
                }
            }
        }

        let mut added: Vec<(String, String)> = desired.into_iter().collect();
        added.sort();
        mutations.extend(added.into_iter().map(|(k, v)| SecretEnvVar::set(k, v)));

        mutations
    }
}

impl std::fmt::Debug for SecretDiffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretDiffer").finish_non_exhaustive()
    }
}

/// Argon2id hash of a secret, as the platform stores it
#[cfg(test)]
pub(crate) fn hash_secret(plaintext: &str) -> String {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .unwrap_or_else(|e| panic!("hashing failed: {e}"))
}
