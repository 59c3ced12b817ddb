pub mod password;
pub mod validation;

pub use password::{
    hash_password, verify_bcrypt, verify_hashed, verify_password, CredentialFormat, Password,
    ARGON2ID_PREFIX,
};
pub use validation::ValidatedJson;
