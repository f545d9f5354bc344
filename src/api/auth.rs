use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar},
    serde::json::{Error as JsonError, Json},
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{auth_cookie, AuthToken, LoginRequest, LoginResponse, Staff, AUTH_TOKEN_COOKIE},
            response::ApiResponse,
        },
        db::user::User,
        mongodb::Coll,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![login, logout]
}

#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: std::result::Result<Json<LoginRequest>, JsonError<'_>>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<ApiResponse<LoginResponse>> {
    let credentials = credentials.map_err(Error::from)?;
    let with_email = doc! {
        "email": credentials.email.to_lowercase()
    };

    let user = match users.find_one(with_email, None).await? {
        Some(user) if user.verify_password(&credentials.password)? => user,
        _ => {
            return Err(Error::Unauthorized(
                "No staff member found with the provided email and password combination"
                    .to_string(),
            ))
        }
    };

    let token = AuthToken::<Staff>::new(&user).encode(config)?;
    cookies.add(auth_cookie(token.clone(), config));
    info!("{} logged in as {}", user.email, user.role);

    Ok(ApiResponse::ok(
        LoginResponse {
            token,
            user: user.into(),
        },
        "Logged in",
    ))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar<'_>) -> ApiResponse<()> {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    ApiResponse::message("Logged out")
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::api::test_support::envelope_of;
    use crate::model::{common::role::Role, db::user::NewUser};

    use super::*;

    #[backend_test]
    async fn login_valid(client: Client, users: Coll<NewUser>) {
        users.insert_one(NewUser::example(), None).await.unwrap();

        let response = client
            .post(uri!("/api", login))
            .header(ContentType::JSON)
            .body(json!(LoginRequest::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        let envelope = envelope_of::<LoginResponse>(response).await;
        let data = envelope.data.unwrap();
        assert!(!data.token.is_empty());
        assert_eq!(data.user.role, Role::Admin);
        assert_eq!(data.user.email, NewUser::example().email);
    }

    #[backend_test]
    async fn login_invalid(client: Client, users: Coll<NewUser>) {
        users.insert_one(NewUser::example(), None).await.unwrap();

        // Unknown email.
        let response = client
            .post(uri!("/api", login))
            .header(ContentType::JSON)
            .body(json!({ "email": "nobody@dapa.local", "password": "dapa4lyfe" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        // Wrong password.
        let response = client
            .post(uri!("/api", login))
            .header(ContentType::JSON)
            .body(json!({ "email": NewUser::example().email, "password": "" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        let envelope = envelope_of::<LoginResponse>(response).await;
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn malformed_login(client: Client) {
        let response = client
            .post(uri!("/api", login))
            .header(ContentType::JSON)
            .body("{\"email\": ")
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let envelope = envelope_of::<()>(response).await;
        assert_eq!(envelope.message, "Invalid request format");
        assert_eq!(envelope.errors.len(), 1);
    }

    #[backend_test(admin)]
    async fn logout_clears_cookie(client: Client) {
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let response = client.delete(uri!("/api", logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn logout_not_logged_in(client: Client) {
        let response = client.delete(uri!("/api", logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
    }

    #[backend_test]
    async fn bearer_token_is_accepted(client: Client, users: Coll<NewUser>) {
        users.insert_one(NewUser::example(), None).await.unwrap();
        let response = client
            .post(uri!("/api", login))
            .header(ContentType::JSON)
            .body(json!(LoginRequest::example()).to_string())
            .dispatch()
            .await;
        let token = envelope_of::<LoginResponse>(response)
            .await
            .data
            .unwrap()
            .token;

        // Drop the cookie so only the header authenticates.
        client.delete(uri!("/api", logout)).dispatch().await;
        let response = client.get("/api/form/question-types").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client
            .get("/api/form/question-types")
            .header(Header::new("Authorization", format!("Bearer {token}")))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .get("/api/form/question-types")
            .header(Header::new("Authorization", "Bearer not-a-jwt"))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(driver)]
    async fn drivers_are_not_admins(client: Client) {
        let response = client.get("/api/form/question-types").dispatch().await;
        assert_eq!(Status::Forbidden, response.status());
        let envelope = envelope_of::<()>(response).await;
        assert_eq!(envelope.message, "Insufficient permissions");
    }

    #[backend_test]
    async fn anonymous_requests_need_a_token(client: Client) {
        let response = client
            .post("/api/form/questions")
            .header(ContentType::JSON)
            .body("{}")
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        let envelope = envelope_of::<()>(response).await;
        assert_eq!(envelope.message, "Authentication required");
    }
}
