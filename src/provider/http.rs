//! Blocking HTTP client bridged into async code
//!
//! Requests run on tokio's blocking pool and are raced against the caller's
//! context. A request abandoned because the context finished keeps running
//! until the agent's own timeout fires; its result is dropped.

use crate::context::Context;
use crate::error::{GridError, GridResult};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Per-request timeout applied by the agent
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Agent shared by every request a provider makes
pub(crate) fn agent() -> Agent {
    Agent::config_builder()
        .timeout_global(Some(REQUEST_TIMEOUT))
        .build()
        .into()
}

/// Join a base API URL and a relative path
pub(crate) fn build_url(api_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        api_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// A GET request description
#[derive(Debug, Clone, Default)]
pub(crate) struct Request {
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
}

impl Request {
    pub(crate) fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub(crate) fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub(crate) fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Send the request and decode a JSON body
    pub(crate) async fn json<T>(self, ctx: &Context, agent: &Agent) -> GridResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = agent.clone();
        debug!("calling {}", self.url);

        let task = tokio::task::spawn_blocking(move || self.send_blocking::<T>(&agent));

        tokio::select! {
            biased;

            _ = ctx.done() => Err(GridError::Timeout),
            joined = task => joined.map_err(|e| GridError::Task(e.to_string()))?,
        }
    }

    fn send_blocking<T: DeserializeOwned>(self, agent: &Agent) -> GridResult<T> {
        let mut request = agent.get(&self.url);
        for (key, value) in &self.query {
            request = request.query(key.as_str(), value.as_str());
        }
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let mut response = request.call().map_err(map_ureq_error)?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(map_ureq_error)?;

        serde_json::from_str(&body).map_err(|e| GridError::decode(self.url.as_str(), e))
    }
}

fn map_ureq_error(err: ureq::Error) -> GridError {
    match err {
        ureq::Error::StatusCode(403) => GridError::Forbidden,
        ureq::Error::StatusCode(status) => GridError::BadStatus { status },
        other => GridError::Http(other.to_string()),
    }
}
