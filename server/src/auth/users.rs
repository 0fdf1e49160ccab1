//! Configured users and credential checks.

use std::collections::BTreeMap;

use super::AuthError;
use super::jwt;

/// The set of users allowed to run queries.
#[derive(Debug, Clone)]
pub struct UserDirectory {
    passwords: BTreeMap<String, String>,
    jwt_secret: Option<Vec<u8>>,
}

impl UserDirectory {
    #[must_use]
    pub const fn new(passwords: BTreeMap<String, String>, jwt_secret: Option<Vec<u8>>) -> Self {
        Self {
            passwords,
            jwt_secret,
        }
    }

    /// Check `credential` for `user`.
    ///
    /// Accepted when the configured password is empty, equals the
    /// credential, or the credential is a JWT signed with the configured
    /// secret whose subject is `user`.
    pub fn authenticate(&self, user: &str, credential: &str) -> Result<(), AuthError> {
        let password = self
            .passwords
            .get(user)
            .ok_or_else(|| AuthError::UnknownUser(user.to_owned()))?;
        if password.is_empty() || password == credential {
            return Ok(());
        }

        let bad = |reason: String| AuthError::BadCredential {
            user: user.to_owned(),
            reason,
        };
        let Some(secret) = &self.jwt_secret else {
            return Err(bad("wrong password".to_owned()));
        };
        match jwt::verify_hs256(credential, secret) {
            Ok(subject) if subject == user => Ok(()),
            Ok(subject) => Err(bad(format!("token issued to '{subject}'"))),
            // Not a token at all: report it as a password mismatch.
            Err(jwt::JwtError::MalformedToken) => Err(bad("wrong password".to_owned())),
            Err(error) => Err(bad(error.to_string())),
        }
    }
}
