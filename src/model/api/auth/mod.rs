mod token;
mod user;

pub use token::{auth_cookie, Admin, AuthToken, Capability, Staff, AUTH_TOKEN_COOKIE};
pub use user::{
    LoginRequest, LoginResponse, StaffCredentials, StaffDescription, MIN_PASSWORD_LENGTH,
};
