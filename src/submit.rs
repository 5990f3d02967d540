use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;

use crate::api::{CreateBookmarkRequest, error_detail};
use crate::config::Config;
use crate::error::SubmitError;
use crate::model::Bookmark;

const DEFAULT_DISMISS_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Success,
    Failure { message: String },
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success)
    }

    pub fn status_message(&self) -> String {
        match self {
            SubmissionOutcome::Success => "Bookmark saved!".to_owned(),
            SubmissionOutcome::Failure { message } => format!("Error: {}", message),
        }
    }
}

impl From<Result<(), SubmitError>> for SubmissionOutcome {
    fn from(result: Result<(), SubmitError>) -> Self {
        match result {
            Ok(()) => SubmissionOutcome::Success,
            Err(e) => SubmissionOutcome::Failure {
                message: e.to_string(),
            },
        }
    }
}

/// Sends bookmarks to the creation endpoint, one request per call.
#[derive(Clone)]
pub struct BookmarkSubmitter {
    client: reqwest::Client,
    endpoint: String,
    dismiss_delay: Duration,
}

impl BookmarkSubmitter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        BookmarkSubmitter {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            dismiss_delay: DEFAULT_DISMISS_DELAY,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, SubmitError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = cfg.submit.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(BookmarkSubmitter {
            client: builder.build()?,
            endpoint: cfg.bookmarks_endpoint(),
            dismiss_delay: cfg.submit.dismiss_delay(),
        })
    }

    pub fn with_dismiss_delay(mut self, delay: Duration) -> Self {
        self.dismiss_delay = delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// How long the caller should keep a success message up before closing.
    pub fn dismiss_delay(&self) -> Duration {
        self.dismiss_delay
    }

    pub async fn submit(&self, bookmark: &Bookmark) -> SubmissionOutcome {
        let result = self.try_submit(bookmark).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, endpoint = %self.endpoint, "bookmark submission failed");
        }
        result.into()
    }

    async fn try_submit(&self, bookmark: &Bookmark) -> Result<(), SubmitError> {
        tracing::debug!(?bookmark, endpoint = %self.endpoint, "sending bookmark");

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&CreateBookmarkRequest::new(bookmark))
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "got response");

        let text = response.text().await?;
        tracing::debug!(body = %text, "raw response");

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            tracing::warn!(error = %e, "failed to parse response as json");
            SubmitError::InvalidJsonResponse
        })?;

        if !status.is_success() {
            return Err(SubmitError::ServerRejected(error_detail(&body)));
        }

        tracing::info!(title = %bookmark.title, "bookmark saved");
        Ok(())
    }
}
