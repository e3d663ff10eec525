use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl FromStr for SameSite {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lax" => Ok(SameSite::Lax),
            "strict" => Ok(SameSite::Strict),
            "none" => Ok(SameSite::None),
            other => Err(anyhow::anyhow!("Invalid SameSite value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CookieOptions {
    pub secure: bool,
    pub same_site: SameSite,
}

pub const SESSION_COOKIE_NAME: &str = "session";
pub const CSRF_COOKIE_NAME: &str = "csrf_token";
pub const COOKIE_PATH: &str = "/";

/// Session cookie carrying the raw session token. Without a `max_age` the
/// cookie lives for the browser session.
pub fn build_session_cookie(
    value: &str,
    max_age: Option<Duration>,
    options: CookieOptions,
) -> String {
    build_cookie(SESSION_COOKIE_NAME, value, max_age, true, options)
}

/// CSRF cookie. Readable by page scripts so they can echo it in a header.
pub fn build_csrf_cookie(value: &str, options: CookieOptions) -> String {
    build_cookie(CSRF_COOKIE_NAME, value, None, false, options)
}

pub fn build_clear_cookie(name: &str, options: CookieOptions) -> String {
    let mut cookie = format!(
        "{}=; Path={}; Max-Age=0; HttpOnly; SameSite={}",
        name,
        COOKIE_PATH,
        same_site_value(options.same_site)
    );
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn build_cookie(
    name: &str,
    value: &str,
    max_age: Option<Duration>,
    http_only: bool,
    options: CookieOptions,
) -> String {
    let mut cookie = format!("{}={}; Path={}", name, value, COOKIE_PATH);
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age.as_secs()));
    }
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    cookie.push_str("; SameSite=");
    cookie.push_str(same_site_value(options.same_site));
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn extract_cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next()?.trim();
        let value = parts.next()?.trim();
        if key == name && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

fn same_site_value(same_site: SameSite) -> &'static str {
    match same_site {
        SameSite::Lax => "Lax",
        SameSite::Strict => "Strict",
        SameSite::None => "None",
    }
}
