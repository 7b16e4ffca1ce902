//! Delegated login through an external OAuth 2.0 identity provider

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use thiserror::Error;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// Login provider failures
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Unknown or expired login state")]
    UnknownState,

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("Userinfo request failed: {0}")]
    UserInfo(String),

    #[error("Provider did not return a verified email")]
    UnverifiedEmail,
}

/// Where to send the browser, plus what to remember until it comes back
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub csrf_state: String,
    pub pkce_verifier: String,
}

/// Identity returned by the provider after a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub email: String,
    pub name: Option<String>,
}

impl UserInfo {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("User")
    }
}

/// External identity provider behind /login and /callback
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Start a new authorization-code login
    fn authorization_request(&self) -> AuthorizationRequest;

    /// Finish a login: trade the code for a token and read the user's identity
    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<UserInfo, OAuthError>;
}

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(Debug, Deserialize)]
struct OpenIdUserInfo {
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

/// Google sign-in with PKCE
pub struct GoogleProvider {
    client: ConfiguredClient,
    http: reqwest::Client,
    userinfo_url: String,
}

impl GoogleProvider {
    pub fn new(client_id: &str, client_secret: &str, redirect_url: &str) -> anyhow::Result<Self> {
        Self::with_endpoints(
            client_id,
            client_secret,
            redirect_url,
            GOOGLE_AUTH_URL,
            GOOGLE_TOKEN_URL,
            GOOGLE_USERINFO_URL,
        )
    }

    pub fn with_endpoints(
        client_id: &str,
        client_secret: &str,
        redirect_url: &str,
        auth_url: &str,
        token_url: &str,
        userinfo_url: &str,
    ) -> anyhow::Result<Self> {
        let client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_auth_uri(AuthUrl::new(auth_url.to_string())?)
            .set_token_uri(TokenUrl::new(token_url.to_string())?)
            .set_redirect_uri(RedirectUrl::new(redirect_url.to_string())?);

        // Token endpoint redirects are not followed
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            http,
            userinfo_url: userinfo_url.to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_request(&self) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(pkce_challenge)
            .url();

        AuthorizationRequest {
            url: url.to_string(),
            csrf_state: csrf_state.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        }
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<UserInfo, OAuthError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;

        let info: OpenIdUserInfo = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?
            .json()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;

        match (info.email, info.email_verified) {
            (Some(email), Some(true) | None) => Ok(UserInfo {
                email,
                name: info.name,
            }),
            _ => Err(OAuthError::UnverifiedEmail),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider_for(server: &MockServer) -> GoogleProvider {
        GoogleProvider::with_endpoints(
            "client-id",
            "client-secret",
            "http://localhost:5000/callback",
            &format!("{}/auth", server.uri()),
            &format!("{}/token", server.uri()),
            &format!("{}/userinfo", server.uri()),
        )
        .unwrap()
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("code_verifier=the-verifier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-123",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_authorization_request_carries_state_and_pkce() {
        let provider = GoogleProvider::new("client-id", "secret", "http://localhost:5000/callback")
            .unwrap();
        let request = provider.authorization_request();

        assert!(request.url.starts_with(GOOGLE_AUTH_URL));
        assert!(request.url.contains("client_id=client-id"));
        assert!(request.url.contains("code_challenge="));
        assert!(request.url.contains(&format!("state={}", request.csrf_state)));
        assert!(request.url.contains("scope=openid+email+profile"));
        assert!(!request.pkce_verifier.is_empty());
    }

    #[tokio::test]
    async fn test_exchange_reads_userinfo() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer access-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "1",
                "email": "me@example.com",
                "email_verified": true,
                "name": "Me Myself"
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let user = provider.exchange_code("abc", "the-verifier").await.unwrap();
        assert_eq!(user.email, "me@example.com");
        assert_eq!(user.display_name(), "Me Myself");
    }

    #[tokio::test]
    async fn test_unverified_email_is_rejected() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "email": "me@example.com",
                "email_verified": false
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider.exchange_code("abc", "the-verifier").await.unwrap_err();
        assert!(matches!(err, OAuthError::UnverifiedEmail));
    }

    #[tokio::test]
    async fn test_token_error_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider.exchange_code("abc", "v").await.unwrap_err();
        assert!(matches!(err, OAuthError::Exchange(_)));
    }

    #[test]
    fn test_display_name_defaults_to_user() {
        let info = UserInfo {
            email: "me@example.com".into(),
            name: None,
        };
        assert_eq!(info.display_name(), "User");
    }
}
