use std::ops::{Deref, DerefMut};

use mongodb::{bson::doc, error::Error as DbError};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::auth::StaffCredentials,
    common::role::Role,
    mongodb::{Coll, Id},
};

/// Email of the admin account created on first launch.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@dapa.local";

/// Core staff user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
}

impl UserCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> Result<bool, argon2::Error> {
        argon2::verify_encoded(&self.password_hash, password.as_ref())
    }
}

/// A staff user without an ID.
pub type NewUser = UserCore;

/// A staff user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Ensure at least one admin exists, creating the default one if not.
///
/// This operation is idempotent.
pub async fn ensure_admin_exists(users: &Coll<NewUser>, password: &str) -> Result<(), DbError> {
    let any_admin = doc! { "role": Role::Admin };
    if users.find_one(any_admin, None).await?.is_none() {
        let credentials = StaffCredentials {
            email: DEFAULT_ADMIN_EMAIL.to_string(),
            name: "Administrator".to_string(),
            role: Role::Admin,
            password: password.to_string(),
        };
        match NewUser::try_from(credentials) {
            Ok(admin) => {
                users.insert_one(admin, None).await?;
                warn!("Created default admin {DEFAULT_ADMIN_EMAIL}, change its password");
            }
            Err(err) => error!("Could not create default admin: {err}"),
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::Database;

    #[backend_test]
    async fn default_admin_is_created_once(db: Database) {
        // The launch already created it.
        let users = Coll::<NewUser>::from_db(&db);
        ensure_admin_exists(&users, "another-password").await.unwrap();
        let count = users
            .count_documents(doc! { "role": Role::Admin }, None)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let admin = users
            .find_one(doc! { "email": DEFAULT_ADMIN_EMAIL }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!admin.verify_password("another-password").unwrap());
    }
}
