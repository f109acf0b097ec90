use app_core::extractors::{AppPath, AppQuery};
use app_core::oauth::OAuthError;
use axum::debug_handler;
use axum::extract::State;
use axum::response::Redirect;
use serde_json::json;
use tower_cookies::cookie::{SameSite, time};
use tower_cookies::{Cookie, Cookies};

use super::COOKIE_SESSION;
use crate::domain::entity::provider_link::Provider;
use crate::domain::error::IdentityError;
use crate::domain::inout::prelude::*;
use crate::inbound::model::prelude::*;
use crate::inbound::state::IdentityState;

const COOKIE_OAUTH_STATE: &str = "__oauth_state";
const KEY_OAUTH_STATE_CSRF: &str = "csrf_token";
const KEY_OAUTH_STATE_PKCE: &str = "pkce_verifier";

const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;

#[debug_handler]
pub async fn oauth_authorize(
    State(state): State<IdentityState>,
    cookies: Cookies,
    AppPath(provider): AppPath<String>,
) -> Redirect {
    let provider = match provider.parse::<Provider>() {
        Ok(provider) => provider,
        Err(err) => {
            tracing::warn!(provider = %provider, "rejected authorization request for unknown provider");
            return failure_redirect(&state, &err);
        },
    };

    match state.login.authorize(AuthorizeInput { provider }).await {
        Ok(output) => {
            let oauth_state = json!({
                KEY_OAUTH_STATE_CSRF: output.csrf_token,
                KEY_OAUTH_STATE_PKCE: output.pkce_verifier,
            });
            let value = serde_json::to_string(&oauth_state).unwrap();

            let cookie = Cookie::build((COOKIE_OAUTH_STATE, value))
                .http_only(true)
                .secure(true)
                .path("/")
                .max_age(time::Duration::minutes(5))
                .same_site(SameSite::Lax)
                .build();

            cookies.private(&state.cookie_key).add(cookie);

            Redirect::to(&output.auth_url)
        },
        Err(err) => {
            tracing::error!(provider = %provider, error = %err, "failed to start provider handshake");
            failure_redirect(&state, &err)
        },
    }
}

#[debug_handler]
pub async fn oauth_callback(
    State(state): State<IdentityState>,
    cookies: Cookies,
    AppPath(provider): AppPath<String>,
    AppQuery(query): AppQuery<CallbackQuery>,
) -> Redirect {
    let provider = match provider.parse::<Provider>() {
        Ok(provider) => provider,
        Err(err) => {
            tracing::warn!(provider = %provider, "rejected callback for unknown provider");
            return failure_redirect(&state, &err);
        },
    };

    match run_callback(&state, &cookies, provider, query).await {
        Ok(output) => {
            let ttl_secs = state.config.get::<u64>("session.ttl_secs").unwrap_or(DEFAULT_SESSION_TTL_SECS);
            let cookie = Cookie::build((COOKIE_SESSION, output.session_token))
                .http_only(true)
                .secure(true)
                .path("/")
                .max_age(time::Duration::seconds(ttl_secs as i64))
                .same_site(SameSite::Lax)
                .build();

            cookies.private(&state.cookie_key).add(cookie);

            let success_url = state
                .config
                .get::<String>("oauth.success_redirect")
                .unwrap_or_else(|_| "/".to_string());
            Redirect::to(&success_url)
        },
        Err(err) => {
            tracing::error!(provider = %provider, error = %err, "provider callback failed");
            failure_redirect(&state, &err)
        },
    }
}

/// The callback body separated out so every failure funnels through one
/// classified redirect in the handler.
async fn run_callback(
    state: &IdentityState,
    cookies: &Cookies,
    provider: Provider,
    query: CallbackQuery,
) -> Result<CallbackOutput, IdentityError> {
    if let Some(error) = query.error {
        tracing::warn!(provider = %provider, error = %error, "provider reported an authorization error");
        return Err(IdentityError::Handshake(OAuthError::TokenExchange(error)));
    }

    let code = query
        .code
        .ok_or_else(|| invalid_state("missing authorization code"))?;

    let state_cookie = cookies
        .private(&state.cookie_key)
        .get(COOKIE_OAUTH_STATE)
        .ok_or_else(|| invalid_state("authorization state cookie missing or expired"))?;
    cookies.private(&state.cookie_key).remove(Cookie::new(COOKIE_OAUTH_STATE, ""));

    let oauth_state: serde_json::Value =
        serde_json::from_str(state_cookie.value()).map_err(|_| invalid_state("malformed authorization state"))?;

    let stored_csrf = oauth_state
        .get(KEY_OAUTH_STATE_CSRF)
        .and_then(|value| value.as_str())
        .ok_or_else(|| invalid_state("malformed authorization state"))?;
    if query.state.as_deref() != Some(stored_csrf) {
        return Err(invalid_state("state token mismatch"));
    }

    let pkce_verifier = oauth_state
        .get(KEY_OAUTH_STATE_PKCE)
        .and_then(|value| value.as_str())
        .ok_or_else(|| invalid_state("malformed authorization state"))?
        .to_string();

    state.login.callback(CallbackInput { provider, code, pkce_verifier }).await
}

fn invalid_state(reason: &str) -> IdentityError {
    IdentityError::Handshake(OAuthError::InvalidState(reason.to_string()))
}

fn failure_redirect(state: &IdentityState, err: &IdentityError) -> Redirect {
    let failure_url = state
        .config
        .get::<String>("oauth.failure_redirect")
        .unwrap_or_else(|_| "/".to_string());

    Redirect::to(&format!("{failure_url}?error={}", err.classification()))
}
