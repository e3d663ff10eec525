//! Double-submit CSRF protection.
//!
//! Safe requests receive a random `csrf_token` cookie when they do not carry
//! one. Every other request must echo that cookie value in the
//! `X-CSRF-Token` header or a `csrf_token` form field, otherwise it is
//! rejected with 403 before any handler runs.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, Method,
    },
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{
    error::{AppError, AuthError},
    state::AppState,
    utils::{
        cookies::{build_csrf_cookie, extract_cookie_value, CSRF_COOKIE_NAME},
        token::{generate_token, MIN_BYTES_PER_TOKEN},
    },
};

pub const CSRF_HEADER_NAME: &str = "x-csrf-token";
pub const CSRF_FORM_FIELD: &str = "csrf_token";

const MAX_FORM_BODY_BYTES: usize = 64 * 1024;
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// The CSRF token valid for this browser, for handlers that render it.
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

pub async fn csrf_protect(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie_token = csrf_cookie(request.headers());

    if is_safe_method(request.method()) {
        let (token, issued) = match cookie_token {
            Some(token) => (token, false),
            None => (
                generate_token(MIN_BYTES_PER_TOKEN).map_err(AuthError::from)?,
                true,
            ),
        };
        request.extensions_mut().insert(CsrfToken(token.clone()));

        let mut response = next.run(request).await;
        if issued {
            let cookie = build_csrf_cookie(&token, state.config.cookie_options());
            append_set_cookie(response.headers_mut(), &cookie);
        }
        return Ok(response);
    }

    let Some(expected) = cookie_token else {
        return Err(rejected(&request, "missing csrf cookie"));
    };

    let (presented, request) = presented_token(request).await?;
    match presented {
        Some(presented) if tokens_equal(&presented, &expected) => {
            let mut request = request;
            request.extensions_mut().insert(CsrfToken(expected));
            Ok(next.run(request).await)
        }
        Some(_) => Err(rejected(&request, "csrf token mismatch")),
        None => Err(rejected(&request, "missing csrf token")),
    }
}

fn append_set_cookie(headers: &mut HeaderMap, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(err) => {
            tracing::warn!(error = %err, "csrf cookie is not a valid header value, not sent");
        }
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn csrf_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| extract_cookie_value(cookies, CSRF_COOKIE_NAME))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().starts_with(FORM_CONTENT_TYPE))
}

/// Finds the submitted token. A form body is buffered to read the field and
/// put back unchanged for the handler.
async fn presented_token(request: Request) -> Result<(Option<String>, Request), AppError> {
    if let Some(header) = request
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|value| value.to_str().ok())
    {
        let header = header.to_string();
        return Ok((Some(header), request));
    }
    if !is_form(request.headers()) {
        return Ok((None, request));
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_FORM_BODY_BYTES).await.map_err(|_| {
        tracing::warn!(path = %parts.uri.path(), "form body too large for csrf check");
        AppError::Forbidden("CSRF token missing or invalid".to_string())
    })?;
    let token = url::form_urlencoded::parse(&bytes)
        .find(|(key, _)| key == CSRF_FORM_FIELD)
        .map(|(_, value)| value.into_owned());

    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}

fn tokens_equal(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn rejected(request: &Request, reason: &'static str) -> AppError {
    tracing::warn!(
        method = %request.method(),
        path = %request.uri().path(),
        reason,
        "csrf check failed"
    );
    AppError::Forbidden("CSRF token missing or invalid".to_string())
}
