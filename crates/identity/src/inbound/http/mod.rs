pub mod account;
pub mod login;

use tower_cookies::{Cookies, Key};

pub(crate) const COOKIE_SESSION: &str = "__session";

/// Reads the session token from the encrypted session cookie, if any.
pub(crate) fn session_token(cookies: &Cookies, key: &Key) -> Option<String> {
    cookies.private(key).get(COOKIE_SESSION).map(|cookie| cookie.value().to_string())
}
