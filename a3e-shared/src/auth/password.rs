/// Password hashing with Argon2id
///
/// Hashes are PHC strings (`$argon2id$v=19$m=65536,t=3,p=4$...`) so the
/// parameters travel with the hash and can be raised later without a
/// migration; verification reads them back from the string.
///
/// # Example
///
/// ```
/// use a3e_shared::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("Accredit3d!").unwrap();
/// assert!(verify_password("Accredit3d!", &hash).unwrap());
/// assert!(!verify_password("accredited", &hash).unwrap());
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, ParamsBuilder, Version,
};

/// Memory cost in KiB (64 MiB)
const M_COST: u32 = 65_536;
const T_COST: u32 = 3;
const P_COST: u32 = 4;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    Hash(String),

    /// Stored hash could not be parsed
    #[error("Invalid password hash: {0}")]
    InvalidHash(String),

    #[error("Failed to verify password: {0}")]
    Verify(String),

    /// Rejected by the strength policy
    #[error("{0}")]
    Weak(&'static str),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(M_COST)
        .t_cost(T_COST)
        .p_cost(P_COST)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Checks a password against a stored PHC hash
///
/// A mismatch is `Ok(false)`; only a malformed hash or an internal failure
/// is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Verify(e.to_string())),
    }
}

/// Enforces the account password policy
///
/// At least eight characters with an uppercase letter, a lowercase letter,
/// a digit and a symbol.
pub fn validate_password_strength(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::Weak("Password must be at least 8 characters long"));
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(PasswordError::Weak("Password must contain an uppercase letter"));
    }
    if !password.chars().any(char::is_lowercase) {
        return Err(PasswordError::Weak("Password must contain a lowercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordError::Weak("Password must contain a digit"));
    }
    if !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        return Err(PasswordError::Weak("Password must contain a symbol"));
    }

    Ok(())
}

/// Hash used to equalize login timing when the email is unknown
///
/// Verifying against it always fails but costs the same as a real check.
pub fn dummy_hash() -> &'static str {
    "$argon2id$v=19$m=65536,t=3,p=4$c29tZXNhbHRzb21lc2FsdA$2Ha8tZbEqRC3nwTqOk0FJ1f2cHVIY3lqLpQ0TSkKsBo"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_uses_configured_params() {
        let hash = hash_password("Accredit3d!").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains("m=65536,t=3,p=4"));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same-Passw0rd").unwrap();
        let b = hash_password("same-Passw0rd").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify() {
        let hash = hash_password("Sacscoc#2025").unwrap();
        assert!(verify_password("Sacscoc#2025", &hash).unwrap());
        assert!(!verify_password("sacscoc#2025", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_dummy_hash_parses_and_never_matches() {
        assert!(!verify_password("anything", dummy_hash()).unwrap());
    }

    #[test]
    fn test_strength_policy() {
        assert!(validate_password_strength("Str0ng!Pass").is_ok());

        for (weak, fragment) in [
            ("Sh0rt!", "8 characters"),
            ("lowercase1!", "uppercase"),
            ("UPPERCASE1!", "lowercase"),
            ("NoDigits!!", "digit"),
            ("NoSymbol123", "symbol"),
        ] {
            let err = validate_password_strength(weak).unwrap_err();
            assert!(err.to_string().contains(fragment), "{weak}: {err}");
        }
    }
}
