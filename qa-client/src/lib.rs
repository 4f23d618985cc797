//! Client for the question-answering backend.
//!
//! The backend exposes `POST /ask` and, optionally, `GET /quota` reporting
//! which answering modes currently have capacity. The client consults a
//! [`CapacityStrategy`] to decide whether to check the quota first and which
//! mode to request.

pub mod wire;

use askbot_core::{AnswerBackend, AnswerResponse, CapacityStrategy, ConfigError, ErrorExt, QaBackendError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use wire::{AskReply, AskRequest, Quota, QuotaEnvelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Thinking,
    Primary,
}

impl BackendMode {
    fn thinking_flag(self) -> bool {
        matches!(self, BackendMode::Thinking)
    }
}

/// Picks the mode to ask in, or `None` when nothing has capacity.
pub fn select_mode(strategy: CapacityStrategy, quota: &Quota) -> Option<BackendMode> {
    match strategy {
        CapacityStrategy::Disabled => Some(BackendMode::Primary),
        CapacityStrategy::PreferThinking if quota.thinking.available => Some(BackendMode::Thinking),
        CapacityStrategy::PreferThinking | CapacityStrategy::PrimaryOnly
            if quota.primary.available =>
        {
            Some(BackendMode::Primary)
        }
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct QaConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub strategy: CapacityStrategy,
}

impl QaConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            field: "ASK_PESU_URL".to_string(),
            value: format!("{base_url} ({e})"),
        })?;

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(120),
            strategy: CapacityStrategy::default(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_strategy(mut self, strategy: CapacityStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), name)
    }
}

#[derive(Debug, Clone)]
pub struct QaClient {
    http_client: Client,
    config: QaConfig,
}

impl QaClient {
    pub fn new(config: QaConfig) -> Result<Self, QaBackendError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| QaBackendError::RequestFailed {
                endpoint: config.base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    pub async fn fetch_quota(&self) -> Result<Quota, QaBackendError> {
        let endpoint = self.config.endpoint("quota");
        let response = self
            .http_client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| transport_error(&endpoint, e))?;

        if !response.status().is_success() {
            return Err(QaBackendError::UnexpectedStatus {
                endpoint,
                status_code: response.status().as_u16(),
            });
        }

        let envelope: QuotaEnvelope =
            response
                .json()
                .await
                .map_err(|e| QaBackendError::InvalidResponseFormat {
                    endpoint: endpoint.clone(),
                    details: e.to_string(),
                })?;
        debug!("Backend quota: {:?}", envelope.quota);
        Ok(envelope.quota)
    }

    async fn post_ask(
        &self,
        query: &str,
        mode: Option<BackendMode>,
    ) -> Result<AskReply, QaBackendError> {
        let endpoint = self.config.endpoint("ask");
        let request = AskRequest {
            query,
            thinking: mode.map(BackendMode::thinking_flag),
        };

        let response = self
            .http_client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&endpoint, e))?;

        if !response.status().is_success() {
            return Err(QaBackendError::UnexpectedStatus {
                endpoint,
                status_code: response.status().as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| QaBackendError::InvalidResponseFormat {
                endpoint,
                details: e.to_string(),
            })
    }

    /// Fallible version of [`AnswerBackend::ask`].
    pub async fn try_ask(&self, query: &str) -> Result<AnswerResponse, QaBackendError> {
        let mode = match self.config.strategy {
            CapacityStrategy::Disabled => None,
            strategy => {
                let quota = self.fetch_quota().await?;
                match select_mode(strategy, &quota) {
                    Some(mode) => Some(mode),
                    None => return Err(QaBackendError::NoCapacity),
                }
            }
        };

        if let Some(mode) = mode {
            info!("Asking backend in {:?} mode", mode);
        }
        let reply = self.post_ask(query, mode).await?;
        Ok(reply.into())
    }
}

#[async_trait]
impl AnswerBackend for QaClient {
    async fn ask(&self, query: &str) -> AnswerResponse {
        match self.try_ask(query).await {
            Ok(response) => response,
            Err(QaBackendError::NoCapacity) => {
                warn!("No backend modes available to answer");
                AnswerResponse::failure("no backend mode has capacity")
            }
            Err(e) => {
                e.log_error();
                AnswerResponse::failure(e.to_string())
            }
        }
    }
}

fn transport_error(endpoint: &str, error: reqwest::Error) -> QaBackendError {
    if error.is_timeout() {
        QaBackendError::RequestTimeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        QaBackendError::RequestFailed {
            endpoint: endpoint.to_string(),
            reason: error.to_string(),
        }
    }
}
