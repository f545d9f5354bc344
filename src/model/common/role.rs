use std::fmt::Display;

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Staff roles. Stored by name in the database, but by number in tokens to
/// keep them short.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Driver,
    Assistant,
}

/// The compact token representation of a [`Role`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Admin = 0,
    Driver = 1,
    Assistant = 2,
}

impl From<Role> for Rights {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => Self::Admin,
            Role::Driver => Self::Driver,
            Role::Assistant => Self::Assistant,
        }
    }
}

impl From<Rights> for Role {
    fn from(rights: Rights) -> Self {
        match rights {
            Rights::Admin => Self::Admin,
            Rights::Driver => Self::Driver,
            Rights::Assistant => Self::Assistant,
        }
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Admin => "admin",
                Self::Driver => "driver",
                Self::Assistant => "assistant",
            }
        )
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}
