//! OAuth 2.0 handshake clients (authorization-code flow with PKCE).
//!
//! The clients here stop at the provider boundary: they produce the
//! authorization URL, exchange the callback code, and fetch the raw
//! userinfo attribute map. What those attributes *mean* is decided
//! downstream by claims normalization.

use std::collections::HashMap;
use std::sync::Arc;

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl,
    Scope, TokenResponse, TokenUrl,
};
use reqwest::{ClientBuilder, redirect};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(#[from] oauth2::url::ParseError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("OAuth token exchange failed: {0}")]
    TokenExchange(String),

    #[error("OAuth callback state invalid: {0}")]
    InvalidState(String),

    #[error("Failed to parse user attributes response")]
    AttributesParse,

    #[error("Provider not configured: {0}")]
    ProviderNotFound(String),
}

/// Raw, provider-shaped attribute map from a userinfo endpoint.
pub type RawClaims = serde_json::Map<String, serde_json::Value>;

pub struct AuthorizationDetails {
    pub url: String,
    pub csrf_token: CsrfToken,
    pub pkce_verifier: PkceCodeVerifier,
}

#[async_trait::async_trait]
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait OAuthClient: Send + Sync {
    /// Builds the provider authorization URL together with the CSRF token
    /// and PKCE verifier the callback leg must present.
    fn authorization_details(&self) -> AuthorizationDetails;

    /// Exchanges an authorization code for a provider access token.
    async fn exchange_code(&self, code: String, pkce_verifier: String) -> Result<String, OAuthError>;

    /// Fetches the raw user attributes for an access token.
    async fn fetch_claims(&self, access_token: &str) -> Result<RawClaims, OAuthError>;
}

/// Userinfo requests identify this service to the provider; GitHub
/// rejects requests without a User-Agent outright.
const USER_AGENT: &str = "social-login";

/// A standard authorization-code + PKCE client, parameterized over the
/// provider's endpoints. Use [`HandshakeClient::google`] or
/// [`HandshakeClient::github`] to construct one.
#[derive(Debug)]
pub struct HandshakeClient {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    userinfo_url: String,
    scopes: Vec<&'static str>,
}

impl HandshakeClient {
    pub fn google(client_id: String, client_secret: String, redirect_uri: String) -> Result<Self, OAuthError> {
        Ok(Self {
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            auth_url: AuthUrl::new("https://accounts.google.com/o/oauth2/v2/auth".to_string())?,
            token_url: TokenUrl::new("https://oauth2.googleapis.com/token".to_string())?,
            redirect_url: RedirectUrl::new(redirect_uri)?,
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
            scopes: vec!["openid", "email", "profile"],
        })
    }

    pub fn github(client_id: String, client_secret: String, redirect_uri: String) -> Result<Self, OAuthError> {
        Ok(Self {
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            auth_url: AuthUrl::new("https://github.com/login/oauth/authorize".to_string())?,
            token_url: TokenUrl::new("https://github.com/login/oauth/access_token".to_string())?,
            redirect_url: RedirectUrl::new(redirect_uri)?,
            userinfo_url: "https://api.github.com/user".to_string(),
            scopes: vec!["read:user", "user:email"],
        })
    }

    fn basic_client(
        &self,
    ) -> BasicClient<
        oauth2::EndpointSet,
        oauth2::EndpointNotSet,
        oauth2::EndpointNotSet,
        oauth2::EndpointNotSet,
        oauth2::EndpointSet,
    > {
        BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
    }
}

#[async_trait::async_trait]
impl OAuthClient for HandshakeClient {
    fn authorization_details(&self) -> AuthorizationDetails {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let client = self.basic_client();
        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in &self.scopes {
            request = request.add_scope(Scope::new((*scope).to_string()));
        }
        let (auth_url, csrf_token) = request.set_pkce_challenge(pkce_challenge).url();

        AuthorizationDetails { url: auth_url.to_string(), csrf_token, pkce_verifier }
    }

    async fn exchange_code(&self, code: String, pkce_verifier: String) -> Result<String, OAuthError> {
        let http_client = ClientBuilder::new().redirect(redirect::Policy::none()).build().map_err(|err| {
            tracing::error!("failed to build HTTP client for token exchange: {err:?}");
            OAuthError::HttpClient(err)
        })?;

        let token = self
            .basic_client()
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&http_client)
            .await
            .map_err(|err| {
                let reason = match &err {
                    oauth2::RequestTokenError::ServerResponse(server) => {
                        format!("server response error: {:?}", server.error_description())
                    },
                    oauth2::RequestTokenError::Parse(_, body) => match std::str::from_utf8(body) {
                        Ok(body) => format!("parse error, response body: {body}"),
                        Err(_) => "parse error with non-UTF8 response".to_string(),
                    },
                    _ => format!("token exchange error: {err:?}"),
                };
                tracing::error!("OAuth token exchange failed: {reason}");
                OAuthError::TokenExchange(reason)
            })?;

        Ok(token.access_token().secret().to_string())
    }

    async fn fetch_claims(&self, access_token: &str) -> Result<RawClaims, OAuthError> {
        let response = reqwest::Client::new()
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let attributes: serde_json::Value = response.json().await.map_err(|_| OAuthError::AttributesParse)?;

        match attributes {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(OAuthError::AttributesParse),
        }
    }
}

/// Registry of configured handshake clients, keyed by provider name.
#[derive(Clone, Default)]
pub struct OAuthManager {
    providers: HashMap<String, Arc<dyn OAuthClient>>,
}

impl OAuthManager {
    pub fn new() -> Self {
        Self { providers: HashMap::new() }
    }

    pub fn add_provider(&mut self, name: &str, client: Arc<dyn OAuthClient>) {
        self.providers.insert(name.to_string(), client);
    }

    pub fn get_provider(&self, name: &str) -> Result<&Arc<dyn OAuthClient>, OAuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| OAuthError::ProviderNotFound(name.to_string()))
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }
}
