//! Provider authentication.
//!
//! The engine only ever sees an [`AuthToken`]: an opaque access token plus
//! its type, forwarded as the `Authorization` header on every request. The
//! token is never inspected or renewed.
//!
//! [`OAuthClient`] performs the OAuth2 authorization-code exchange. The
//! interactive part (showing the authorize URL and reading the code back)
//! sits behind the [`AuthCodeSource`] callback so the exchange itself stays
//! headless and testable.

mod error;

pub use error::AuthError;

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use crate::provider::DEFAULT_API_BASE;
use crate::user_agent;

/// Timeout for the token exchange request.
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of response-body characters kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// How the access token is presented to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// OAuth2 access token (`Authorization: Bearer ...`). Required for downloads.
    Bearer,
    /// API key (`Authorization: Token ...`). Sufficient for search only.
    Token,
}

impl TokenType {
    /// Returns the `Authorization` scheme.
    #[must_use]
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Bearer => "Bearer",
            Self::Token => "Token",
        }
    }
}

/// Opaque credential forwarded with every provider request.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    access_token: String,
    token_type: TokenType,
}

impl AuthToken {
    /// Creates an OAuth2 bearer token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: TokenType::Bearer,
        }
    }

    /// Creates an API-key token.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            access_token: key.into(),
            token_type: TokenType::Token,
        }
    }

    /// Token type.
    #[must_use]
    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type.scheme(), self.access_token)
    }
}

// Keep the secret out of logs and `{:?}` output.
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Source of the authorization code obtained after the user approves access.
pub trait AuthCodeSource {
    /// Shows `authorize_url` to the user and returns the code they paste back.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CodeSource`] when no code can be read.
    fn obtain_auth_code(&self, authorize_url: &Url) -> Result<String, AuthError>;
}

/// OAuth2 application credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    /// Application client id.
    pub client_id: String,
    /// Application client secret.
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Authorization-code exchange against the provider's OAuth2 endpoints.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client: Client,
    credentials: ClientCredentials,
    base_url: Url,
}

impl OAuthClient {
    /// Creates a client against the production provider.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(credentials: ClientCredentials) -> Result<Self, AuthError> {
        Self::with_base_url(DEFAULT_API_BASE, credentials)
    }

    /// Creates a client against a custom API base (used by tests).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidUrl`] for an unparseable base and
    /// [`AuthError::ClientBuild`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, credentials: ClientCredentials) -> Result<Self, AuthError> {
        let base_url = parse_base(base_url).ok_or_else(|| AuthError::InvalidUrl {
            url: base_url.to_string(),
        })?;
        let client = Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|source| AuthError::ClientBuild { source })?;

        Ok(Self {
            client,
            credentials,
            base_url,
        })
    }

    /// URL the user must visit to approve access.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidUrl`] if the endpoint cannot be joined.
    pub fn authorize_url(&self) -> Result<Url, AuthError> {
        let mut url = self.endpoint("oauth2/authorize/")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("response_type", "code");
        Ok(url)
    }

    /// Runs the full flow: obtain a code from `source`, then exchange it.
    ///
    /// # Errors
    ///
    /// Propagates code-source and exchange errors.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, source: &dyn AuthCodeSource) -> Result<AuthToken, AuthError> {
        let authorize_url = self.authorize_url()?;
        let code = source.obtain_auth_code(&authorize_url)?;
        self.exchange_code(&code).await
    }

    /// Exchanges an authorization code for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCode`] for a blank code,
    /// [`AuthError::Rejected`] for a non-success response and
    /// [`AuthError::InvalidResponse`] when no token is present.
    #[instrument(skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<AuthToken, AuthError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }

        let url = self.endpoint("oauth2/access_token/")?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("client_secret", &self.credentials.client_secret)
            .append_pair("grant_type", "authorization_code")
            .append_pair("code", code)
            .finish();

        debug!(url = %url, "exchanging authorization code");
        let response = self
            .client
            .post(url.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|source| AuthError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| AuthError::Network {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let token: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| AuthError::invalid_response(e.to_string()))?;
        if token.access_token.trim().is_empty() {
            return Err(AuthError::invalid_response("empty access_token"));
        }

        info!("obtained OAuth2 access token");
        Ok(AuthToken::bearer(token.access_token))
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url.join(path).map_err(|_| AuthError::InvalidUrl {
            url: format!("{}{path}", self.base_url),
        })
    }
}

/// Parses an API base URL, ensuring a trailing slash so relative joins append.
pub(crate) fn parse_base(base_url: &str) -> Option<Url> {
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };
    Url::parse(&normalized).ok()
}
