//! Password credentials: hashing, strength policy, temporary passwords.

use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use rand::Rng;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;

use crate::config::Argon2 as ArgonConfig;

/// Temporary passwords satisfy the strength policy by construction.
pub const TEMP_PASSWORD_LENGTH: usize = 12;
const TEMP_SPECIAL: &[u8] = b"!@#$%^&*";
const STRENGTH_SPECIAL: &str = "!@#$%^&*(),.?\":{}|<>";

#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("argon2 error: {0}")]
    Argon2(String),
}

/// Classification of a password by length and character-class composition.
///
/// Pure and deterministic; only [`PasswordStrength::Strong`] and
/// [`PasswordStrength::VeryStrong`] are accepted by registration and reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasswordStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl PasswordStrength {
    pub fn classify(password: &str) -> Self {
        let length = password.chars().count();
        let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        let has_special = password.chars().any(|c| STRENGTH_SPECIAL.contains(c));

        if length < 6 {
            Self::Weak
        } else if length < 8 && (has_upper || has_lower) && has_digit {
            Self::Moderate
        } else if length >= 8 && has_upper && has_lower && has_digit && has_special {
            Self::VeryStrong
        } else if length >= 8 && has_upper && has_lower && has_digit {
            Self::Strong
        } else {
            Self::Weak
        }
    }

    /// Whether the password clears the acceptance threshold.
    pub fn is_acceptable(&self) -> bool {
        matches!(self, Self::Strong | Self::VeryStrong)
    }
}

impl std::fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            Self::Weak => "Weak",
            Self::Moderate => "Moderate",
            Self::Strong => "Strong",
            Self::VeryStrong => "Very Strong",
        })
    }
}

/// Password manager that uses Argon2id and PHC string format for hashing and
/// verification.
pub struct PasswordManager {
    params: Params,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(
        config: Option<ArgonConfig>,
    ) -> Result<Self, CredentialError> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CredentialError::Argon2(err.to_string()))?;

        Ok(Self { params })
    }

    /// Hash password using Argon2id.
    pub fn hash_password(
        &self,
        password: impl AsRef<[u8]>,
    ) -> Result<String, CredentialError> {
        let argon2 = Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        );
        let salt = SaltString::generate(&mut OsRng);
        let hash = argon2
            .hash_password(password.as_ref(), &salt)
            .map_err(|e| CredentialError::Argon2(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify password against a PHC string.
    pub fn verify_password(
        &self,
        password: impl AsRef<[u8]>,
        phc_hash: &str,
    ) -> bool {
        let argon2 = Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        );

        let Ok(parsed) = PasswordHash::new(phc_hash) else {
            return false;
        };

        argon2.verify_password(password.as_ref(), &parsed).is_ok()
    }
}

/// Generate a temporary password: at least one uppercase, one lowercase, one
/// digit and one special character, shuffled to avoid positional
/// predictability.
pub fn generate_temp_password() -> String {
    let mut rng = OsRng;
    let pool: Vec<u8> = (b'A'..=b'Z')
        .chain(b'a'..=b'z')
        .chain(b'0'..=b'9')
        .chain(TEMP_SPECIAL.iter().copied())
        .collect();

    let mut password = vec![
        rng.gen_range(b'A'..=b'Z'),
        rng.gen_range(b'a'..=b'z'),
        rng.gen_range(b'0'..=b'9'),
        TEMP_SPECIAL[rng.gen_range(0..TEMP_SPECIAL.len())],
    ];
    while password.len() < TEMP_PASSWORD_LENGTH {
        password.push(pool[rng.gen_range(0..pool.len())]);
    }
    password.shuffle(&mut rng);

    password.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> Option<ArgonConfig> {
        Some(ArgonConfig {
            memory_cost: 1024,
            iterations: 1,
            parallelism: 1,
            hash_length: 32,
        })
    }

    #[test]
    fn test_strength_classification() {
        assert_eq!(PasswordStrength::classify("123"), PasswordStrength::Weak);
        assert_eq!(
            PasswordStrength::classify("abc123"),
            PasswordStrength::Moderate
        );
        assert_eq!(
            PasswordStrength::classify("Password1"),
            PasswordStrength::Strong
        );
        assert_eq!(
            PasswordStrength::classify("Str0ng@Pass"),
            PasswordStrength::VeryStrong
        );

        // Long but single-class passwords stay weak.
        assert_eq!(
            PasswordStrength::classify("aaaaaaaaaaaa"),
            PasswordStrength::Weak
        );

        assert!(!PasswordStrength::Weak.is_acceptable());
        assert!(!PasswordStrength::Moderate.is_acceptable());
        assert!(PasswordStrength::Strong.is_acceptable());
        assert!(PasswordStrength::VeryStrong.is_acceptable());
    }

    #[test]
    fn test_strength_labels() {
        assert_eq!(PasswordStrength::Weak.to_string(), "Weak");
        assert_eq!(PasswordStrength::VeryStrong.to_string(), "Very Strong");
    }

    #[test]
    fn test_hash_and_verify() {
        let pwd = PasswordManager::new(fast_params()).unwrap();

        let hash = pwd.hash_password("Str0ng@Pass").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(pwd.verify_password("Str0ng@Pass", &hash));
        assert!(!pwd.verify_password("Str0ng@Pas", &hash));
        assert!(!pwd.verify_password("Str0ng@Pass", "not a phc string"));
    }

    #[test]
    fn test_temp_password_composition() {
        for _ in 0..32 {
            let password = generate_temp_password();

            assert_eq!(password.chars().count(), TEMP_PASSWORD_LENGTH);
            assert!(password.chars().any(|c| c.is_ascii_uppercase()));
            assert!(password.chars().any(|c| c.is_ascii_lowercase()));
            assert!(password.chars().any(|c| c.is_ascii_digit()));
            assert!(
                password
                    .chars()
                    .any(|c| TEMP_SPECIAL.contains(&(c as u8)))
            );
            assert!(
                PasswordStrength::classify(&password).is_acceptable(),
                "temporary password must satisfy the policy: {password}"
            );
        }
    }
}
