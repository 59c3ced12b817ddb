use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

/// PHC prefix of hashes produced by [`hash_password`].
pub const ARGON2ID_PREFIX: &str = "$argon2id$";

const ARGON2_PREFIX: &str = "$argon2";
const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Shape of a stored credential value, recognised from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFormat {
    /// Current format.
    Argon2id,
    /// `$argon2i$` or `$argon2d$` PHC string.
    Argon2Other,
    Bcrypt,
    /// No `$` prefix: stored before hashing was introduced.
    Plaintext,
    /// `$`-prefixed but not a scheme we can verify.
    Unrecognized,
}

impl CredentialFormat {
    pub fn detect(stored: &str) -> Self {
        if stored.starts_with(ARGON2ID_PREFIX) {
            CredentialFormat::Argon2id
        } else if stored.starts_with(ARGON2_PREFIX) {
            CredentialFormat::Argon2Other
        } else if BCRYPT_PREFIXES.iter().any(|p| stored.starts_with(p)) {
            CredentialFormat::Bcrypt
        } else if !stored.starts_with('$') {
            CredentialFormat::Plaintext
        } else {
            CredentialFormat::Unrecognized
        }
    }

    pub fn is_current(&self) -> bool {
        *self == CredentialFormat::Argon2id
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialFormat::Argon2id => "argon2id",
            CredentialFormat::Argon2Other => "argon2",
            CredentialFormat::Bcrypt => "bcrypt",
            CredentialFormat::Plaintext => "plaintext",
            CredentialFormat::Unrecognized => "unrecognized",
        }
    }
}

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &Password) -> Result<String, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against an Argon2 PHC string in constant time.
///
/// The variant and parameters are taken from the PHC string, so argon2i and
/// argon2d hashes verify as well.
pub fn verify_password(password: &Password, password_hash: &str) -> Result<bool, anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .is_ok())
}

/// Verify a password against a bcrypt hash (`$2a$`, `$2b$` or `$2y$`).
pub fn verify_bcrypt(password: &Password, password_hash: &str) -> Result<bool, anyhow::Error> {
    bcrypt::verify(password.as_str(), password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid bcrypt hash: {}", e))
}

/// Verify against any hashed format [`CredentialFormat::detect`] recognises.
/// Plaintext and unrecognised values are errors here.
pub fn verify_hashed(password: &Password, stored: &str) -> Result<bool, anyhow::Error> {
    match CredentialFormat::detect(stored) {
        CredentialFormat::Argon2id | CredentialFormat::Argon2Other => {
            verify_password(password, stored)
        }
        CredentialFormat::Bcrypt => verify_bcrypt(password, stored),
        format => Err(anyhow::anyhow!(
            "Credential format {} is not a hash",
            format.as_str()
        )),
    }
}
