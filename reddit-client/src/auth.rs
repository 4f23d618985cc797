use askbot_core::{CoreError, RedditApiError};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, ResourceOwnerPassword,
    ResourceOwnerUsername, TokenResponse, TokenUrl,
};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
/// Reddit tokens without an explicit lifetime last an hour.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
/// Tokens are refreshed this long before they actually expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    pub fn needs_refresh(&self) -> bool {
        SystemTime::now() + REFRESH_MARGIN >= self.expires_at
    }
}

/// Script-app authentication using the resource owner password grant.
#[derive(Debug)]
pub struct PasswordAuthenticator {
    oauth_client: BasicClient,
    http_client: reqwest::Client,
    username: ResourceOwnerUsername,
    password: ResourceOwnerPassword,
    token: Mutex<Option<RedditToken>>,
}

impl PasswordAuthenticator {
    pub fn new(
        client_id: String,
        client_secret: String,
        username: String,
        password: String,
        token_url: &str,
        http_client: reqwest::Client,
    ) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(|e| {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!("invalid auth url: {e}"),
            })
        })?;
        let token_url = TokenUrl::new(token_url.to_string()).map_err(|e| {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!("invalid token url: {e}"),
            })
        })?;

        let oauth_client = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            oauth_client,
            http_client,
            username: ResourceOwnerUsername::new(username),
            password: ResourceOwnerPassword::new(password),
            token: Mutex::new(None),
        })
    }

    /// Returns a valid access token, exchanging credentials when the cached one is stale.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.access_token.clone());
            }
            debug!("Cached Reddit token is about to expire, refreshing");
        }

        let token = self.exchange_password().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drops the cached token so the next call authenticates again.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    pub async fn cached_token(&self) -> Option<RedditToken> {
        self.token.lock().await.clone()
    }

    async fn exchange_password(&self) -> Result<RedditToken, CoreError> {
        info!(
            "Authenticating with Reddit as {}",
            self.username.as_str()
        );

        let http_client = self.http_client.clone();
        let response = self
            .oauth_client
            .exchange_password(&self.username, &self.password)
            .request_async(|request| send_token_request(http_client, request))
            .await
            .map_err(|e| {
                error!("Reddit token exchange failed: {}", e);
                CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: e.to_string(),
                })
            })?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        debug!("Obtained Reddit token valid for {:?}", lifetime);
        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + lifetime,
            scope,
        })
    }
}

/// Sends the token request with the shared client so the configured
/// user agent and timeout also apply to authentication.
async fn send_token_request(
    client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry() {
        let now = SystemTime::now();

        let fresh = RedditToken {
            access_token: "fresh".to_string(),
            expires_at: now + Duration::from_secs(3600),
            scope: vec!["*".to_string()],
        };
        assert!(!fresh.is_expired());
        assert!(!fresh.needs_refresh());

        let expiring = RedditToken {
            access_token: "expiring".to_string(),
            expires_at: now + Duration::from_secs(30),
            scope: vec![],
        };
        assert!(!expiring.is_expired());
        assert!(expiring.needs_refresh());

        let expired = RedditToken {
            access_token: "expired".to_string(),
            expires_at: now - Duration::from_secs(1),
            scope: vec![],
        };
        assert!(expired.is_expired());
        assert!(expired.needs_refresh());
    }

    #[test]
    fn test_invalid_token_url() {
        let result = PasswordAuthenticator::new(
            "id".to_string(),
            "secret".to_string(),
            "user".to_string(),
            "pass".to_string(),
            "not a url",
            reqwest::Client::new(),
        );
        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. }))
        ));
    }
}
