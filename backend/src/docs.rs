#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use axum::Json;
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use crate::models::{
    password_reset::{ForgotPasswordRequest, ResetPasswordRequest},
    user::{SigninRequest, SignupRequest, UserResponse},
    CsrfTokenResponse, MessageResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        signup_doc,
        signin_doc,
        signout_doc,
        me_doc,
        csrf_doc,
        forgot_password_doc,
        reset_password_doc
    ),
    components(
        schemas(
            SignupRequest,
            SigninRequest,
            UserResponse,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            CsrfTokenResponse,
            MessageResponse
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Auth", description = "Sign-up, sign-in and sessions"),
        (name = "PasswordReset", description = "Forgot-password and reset links")
    ),
    security(("SessionCookie" = []), ("CsrfHeader" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("session"))),
        );
        components.add_security_scheme(
            "CsrfHeader",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-CSRF-Token"))),
        );
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = UserResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "CSRF token missing or invalid"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth",
    security(("CsrfHeader" = []))
)]
fn signup_doc() {}

#[utoipa::path(
    post,
    path = "/api/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = UserResponse),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "Auth",
    security(("CsrfHeader" = []))
)]
fn signin_doc() {}

#[utoipa::path(
    post,
    path = "/api/signout",
    responses((status = 200, description = "Session deleted", body = MessageResponse)),
    tag = "Auth"
)]
fn signout_doc() {}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Signed-in user", body = UserResponse),
        (status = 401, description = "No active session")
    ),
    tag = "Auth",
    security(("SessionCookie" = []))
)]
fn me_doc() {}

#[utoipa::path(
    get,
    path = "/api/csrf",
    responses((status = 200, description = "Current CSRF token", body = CsrfTokenResponse)),
    tag = "Auth",
    security(())
)]
fn csrf_doc() {}

#[utoipa::path(
    post,
    path = "/api/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 202, description = "Accepted whether or not the address is registered", body = MessageResponse)
    ),
    tag = "PasswordReset",
    security(("CsrfHeader" = []))
)]
fn forgot_password_doc() {}

#[utoipa::path(
    post,
    path = "/api/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed and signed in", body = UserResponse),
        (status = 400, description = "Invalid or expired token")
    ),
    tag = "PasswordReset",
    security(("CsrfHeader" = []))
)]
fn reset_password_doc() {}
