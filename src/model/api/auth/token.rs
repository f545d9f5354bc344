use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use mongodb::Database;
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    common::role::{Rights, Role},
    db::user::User,
    mongodb::{Coll, Id},
};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

const BEARER_PREFIX: &str = "Bearer ";

/// Something a staff member may be allowed to do, decided by their role.
pub trait Capability {
    /// Does a user with this role have the capability?
    fn permits(role: Role) -> bool;
}

/// Schema and submission management. Admins only.
pub struct Admin;

impl Capability for Admin {
    fn permits(role: Role) -> bool {
        role == Role::Admin
    }
}

/// Anything any logged in staff member may do.
pub struct Staff;

impl Capability for Staff {
    fn permits(_role: Role) -> bool {
        true
    }
}

/// An authentication token representing a specific staff member, checked to
/// hold capability `C`.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<C> {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<C>,
}

impl<C> AuthToken<C> {
    /// Create a new [`AuthToken`] for the given user.
    pub fn new(user: &User) -> Self {
        Self {
            id: user.id,
            rights: user.role.into(),
            phantom: PhantomData,
        }
    }

    pub fn role(&self) -> Role {
        self.rights.into()
    }

    /// Sign this token into a JWT that expires after the configured lifetime.
    pub fn encode(self, config: &Config) -> Result<String> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(token)
    }

    /// Verify and decode a JWT.
    pub fn decode(token: &str, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Claims<C>>| data.claims.token)?;
        Ok(token)
    }
}

/// Wrap a signed JWT in the authentication cookie.
pub fn auth_cookie(jwt: String, config: &Config) -> Cookie<'static> {
    Cookie::build(AUTH_TOKEN_COOKIE, jwt)
        .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .finish()
}

/// JWT claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<C> {
    #[serde(flatten, bound = "")]
    token: AuthToken<C>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// The raw JWT of a request, from the `Authorization` header or else the cookie.
fn raw_token(req: &Request<'_>) -> Option<String> {
    req.headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix(BEARER_PREFIX))
        .map(|token| token.trim().to_string())
        .or_else(|| {
            req.cookies()
                .get(AUTH_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_string())
        })
}

#[rocket::async_trait]
impl<'r, C> FromRequest<'r> for AuthToken<C>
where
    C: Capability + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the request, verify its user still exists
    /// with the same role, and check the role has capability `C`.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let raw = match raw_token(req) {
            Some(raw) => raw,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Missing authentication token".to_string()),
                ))
            }
        };

        let token = match Self::decode(&raw, config) {
            Ok(token) => token,
            Err(err) => {
                debug!("Rejected token: {err}");
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Invalid or expired token".to_string()),
                ));
            }
        };

        // Check the user actually exists and has not changed role.
        let db = req.guard::<&State<Database>>().await.unwrap();
        match Coll::<User>::from_db(db)
            .find_one(token.id.as_doc(), None)
            .await
        {
            Ok(Some(user)) if Rights::from(user.role) == token.rights => {}
            Ok(_) => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Unknown user".to_string()),
                ))
            }
            Err(err) => return Outcome::Failure((Status::InternalServerError, err.into())),
        }

        if !C::permits(token.role()) {
            return Outcome::Failure((
                Status::Forbidden,
                Error::Forbidden(format!("Role {} may not do this", token.role())),
            ));
        }

        Outcome::Success(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities() {
        assert!(Admin::permits(Role::Admin));
        assert!(!Admin::permits(Role::Driver));
        assert!(!Admin::permits(Role::Assistant));
        assert!(Staff::permits(Role::Assistant));
    }
}
