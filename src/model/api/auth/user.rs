use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{api::id::ApiId, common::role::Role, db::user::{NewUser, User}};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Login details, received from a staff member.
#[derive(Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Raw staff credentials. These are never stored directly, since the password
/// is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct StaffCredentials {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password: String,
}

impl TryFrom<StaffCredentials> for NewUser {
    type Error = Error;

    /// Convert [`StaffCredentials`] to a new [`User`] by hashing the password.
    /// This enforces a plausible email, a non-empty name, and the minimum
    /// password length.
    fn try_from(cred: StaffCredentials) -> Result<Self, Self::Error> {
        let mut errors = Vec::new();
        if !cred.email.contains('@') {
            errors.push("Email must be a valid address".to_string());
        }
        if cred.name.trim().is_empty() {
            errors.push("Name is required".to_string());
        }
        if cred.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            ));
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(cred.password.as_bytes(), &salt, &Config::default())?;
        Ok(Self {
            email: cred.email.to_lowercase(),
            name: cred.name,
            role: cred.role,
            password_hash,
        })
    }
}

/// A staff member, as shown to API clients.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffDescription {
    pub id: ApiId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<User> for StaffDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into(),
            email: user.user.email,
            name: user.user.name,
            role: user.user.role,
        }
    }
}

/// A successful login: the signed token and who it belongs to.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: StaffDescription,
}

#[cfg(test)]
mod examples {
    use super::*;

    impl StaffCredentials {
        pub fn example() -> Self {
            Self {
                email: "coordinator@dapa.local".into(),
                name: "Coordinator".into(),
                role: Role::Admin,
                password: "dapa4lyfe".into(),
            }
        }

        pub fn example_driver() -> Self {
            Self {
                email: "driver@dapa.local".into(),
                name: "Driver".into(),
                role: Role::Driver,
                password: "keepontruckin".into(),
            }
        }
    }

    impl LoginRequest {
        pub fn example() -> Self {
            StaffCredentials::example().into()
        }

        pub fn example_driver() -> Self {
            StaffCredentials::example_driver().into()
        }
    }

    impl From<StaffCredentials> for LoginRequest {
        fn from(cred: StaffCredentials) -> Self {
            Self {
                email: cred.email,
                password: cred.password,
            }
        }
    }
}
