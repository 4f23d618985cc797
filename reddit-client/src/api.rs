use crate::metrics::{ApiMetrics, MetricsCollector, RequestMetrics};
use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use askbot_core::{CoreError, Post, RedditApiError};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    json: CommentResponseBody,
}

#[derive(Debug, Deserialize)]
struct CommentResponseBody {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: RateLimiter,
    metrics: MetricsCollector,
    api_base: String,
}

impl RedditApiClient {
    pub fn new(http_client: Client, api_base: impl Into<String>) -> Self {
        Self {
            http_client,
            rate_limiter: RateLimiter::new(RateLimitConfig::reddit_oauth()),
            metrics: MetricsCollector::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.api_base, endpoint);
        let start_time = Instant::now();

        let _permit = self.rate_limiter.acquire_permit().await;
        debug!("Acquired rate limit permit for {} {}", method, endpoint);

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }
        if let Some(fields) = form {
            request_builder = request_builder.form(fields);
        }

        info!("Making Reddit API request: {} {}", method, endpoint);
        let result = match request_builder.send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Request successful: {} {}", response.status(), endpoint);
                Ok(response)
            }
            Ok(response) => {
                error!(
                    "Request failed with status: {} for {}",
                    response.status(),
                    endpoint
                );
                Err(status_error(&response, endpoint))
            }
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    Err(CoreError::RedditApi(RedditApiError::RequestTimeout))
                } else {
                    Err(CoreError::Network(e))
                }
            }
        };

        let (status_code, rate_limited) = match &result {
            Ok(response) => (Some(response.status().as_u16()), false),
            Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded { .. })) => {
                (Some(429), true)
            }
            Err(_) => (None, false),
        };
        self.metrics
            .record_request(RequestMetrics {
                endpoint: endpoint.to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success: result.is_ok(),
                rate_limited,
            })
            .await;

        result
    }

    /// Newest submissions of `subreddit`, newest first.
    pub async fn get_new_posts(
        &self,
        access_token: &str,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<Post>, CoreError> {
        let endpoint = format!("/r/{}/new", subreddit);
        let limit = limit.to_string();
        let params = [("limit", limit.as_str()), ("raw_json", "1")];

        let response = self
            .make_request(Method::GET, &endpoint, access_token, Some(&params[..]), None)
            .await?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse subreddit posts: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse posts for r/{}", subreddit),
            })
        })?;

        info!(
            "Retrieved {} posts from r/{}",
            listing.data.children.len(),
            subreddit
        );

        Ok(listing
            .data
            .children
            .into_iter()
            .filter(|child| child.kind == "t3")
            .map(|child| Post::from(child.data))
            .collect())
    }

    /// Posts `text` as a top-level comment on submission `post_id`.
    pub async fn submit_comment(
        &self,
        access_token: &str,
        post_id: &str,
        text: &str,
    ) -> Result<(), CoreError> {
        let thing_id = fullname(post_id);
        let form = [
            ("thing_id", thing_id.as_str()),
            ("text", text),
            ("api_type", "json"),
        ];

        let response = self
            .make_request(Method::POST, "/api/comment", access_token, None, Some(&form[..]))
            .await?;

        let body: CommentResponse = response.json().await.map_err(|e| {
            error!("Failed to parse comment response: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse comment response for {}", thing_id),
            })
        })?;

        if !body.json.errors.is_empty() {
            let reason = body
                .json
                .errors
                .iter()
                .map(describe_api_error)
                .collect::<Vec<_>>()
                .join("; ");
            warn!("Reddit rejected comment on {}: {}", thing_id, reason);
            return Err(CoreError::RedditApi(RedditApiError::ReplyRejected {
                post_id: post_id.to_string(),
                reason,
            }));
        }

        debug!("Comment posted on {}", thing_id);
        Ok(())
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.status().await
    }

    pub async fn reset_metrics(&self) {
        self.metrics.reset_metrics().await;
    }
}

fn status_error(response: &Response, endpoint: &str) -> CoreError {
    let status = response.status();
    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        StatusCode::UNAUTHORIZED => RedditApiError::InvalidToken,
        StatusCode::FORBIDDEN => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        StatusCode::NOT_FOUND => RedditApiError::NotFound {
            resource: endpoint.to_string(),
        },
        status if status.is_server_error() => RedditApiError::ServerError {
            status_code: status.as_u16(),
        },
        status => RedditApiError::InvalidResponse {
            details: format!("Unexpected status {} for {}", status, endpoint),
        },
    };
    CoreError::RedditApi(error)
}

/// Reddit errors come back as `[code, message, field]` triples.
fn describe_api_error(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.as_str())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(": "),
        other => other.to_string(),
    }
}

/// Submission ids need the `t3_` kind prefix when used as a thing id.
fn fullname(post_id: &str) -> String {
    if post_id.starts_with("t3_") {
        post_id.to_string()
    } else {
        format!("t3_{}", post_id)
    }
}

fn timestamp_to_utc(created_utc: f64) -> DateTime<Utc> {
    let secs = created_utc.trunc() as i64;
    let nanos = ((created_utc.fract()) * 1e9) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .unwrap_or_default()
}

impl From<RedditPostData> for Post {
    fn from(post_data: RedditPostData) -> Self {
        let permalink = if post_data.permalink.is_empty() {
            String::new()
        } else {
            format!("{}{}", REDDIT_WEB_BASE, post_data.permalink)
        };

        Self {
            id: post_data.id,
            title: post_data.title,
            body: post_data.selftext,
            author: post_data.author,
            url: post_data.url,
            permalink,
            created_utc: timestamp_to_utc(post_data.created_utc),
        }
    }
}
