//! Where metadata values come from.
//!
//! [`MetadataSource`] is the seam between the client and the network;
//! [`GithubSource`] implements it against the GitHub REST API.

use std::future::Future;

use super::{MetadataKey, MetadataValue};
use crate::error::FailureReason;

/// Performs one lookup.
///
/// Implementations report every failure as a [`FailureReason`]; the client
/// adds the timeout around each call.
pub trait MetadataSource {
    fn fetch(&self, key: &MetadataKey) -> impl Future<Output = Result<MetadataValue, FailureReason>>;
}

#[cfg(feature = "fetch")]
pub use github::GithubSource;

#[cfg(feature = "fetch")]
mod github {
    use std::time::Duration;

    use regex::Regex;
    use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LINK, USER_AGENT};
    use reqwest::{Client, StatusCode};
    use serde_json::Value;
    use url::Url;

    use super::MetadataSource;
    use crate::error::FailureReason;
    use crate::metadata::{Identifier, MetadataConfig, MetadataKey, MetadataKind, MetadataValue};
    use crate::{MarginaliaError, Result};

    /// Looks values up in the GitHub REST API.
    ///
    /// | kind           | endpoint                                    | field              |
    /// |----------------|---------------------------------------------|--------------------|
    /// | stars          | `/repos/{owner}/{repo}`                     | `stargazers_count` |
    /// | watchers       | `/repos/{owner}/{repo}`                     | `subscribers_count`|
    /// | repos          | `/users/{owner}`                            | `public_repos`     |
    /// | version        | `/repos/{owner}/{repo}/releases/latest`     | `tag_name`         |
    /// | contributors   | `/repos/{owner}/{repo}/contributors`        | `Link` header      |
    #[derive(Debug, Clone)]
    pub struct GithubSource {
        client: Client,
        base: String,
        token: Option<String>,
        user_agent: String,
    }

    impl GithubSource {
        pub fn new(config: &MetadataConfig) -> Result<Self> {
            let base = Url::parse(&config.api_base)
                .map_err(|e| MarginaliaError::InvalidUrl(format!("{}: {}", config.api_base, e)))?;

            // The client-side timeout is a backstop; the per-request bound
            // applied by `MetadataClient` fires first.
            let client = Client::builder()
                .timeout(config.timeout() + Duration::from_secs(1))
                .build()
                .map_err(MarginaliaError::HttpError)?;

            Ok(Self {
                client,
                base: base.as_str().trim_end_matches('/').to_string(),
                token: config.token.clone(),
                user_agent: config.user_agent.clone(),
            })
        }

        /// Request URL for a key.
        pub fn endpoint(&self, key: &MetadataKey) -> String {
            let owner = key.identifier.owner();
            match (&key.identifier, key.kind) {
                (Identifier::Repo { repo, .. }, MetadataKind::Stargazers | MetadataKind::Watchers) => {
                    format!("{}/repos/{}/{}", self.base, owner, repo)
                }
                (Identifier::Repo { repo, .. }, MetadataKind::LatestVersion) => {
                    format!("{}/repos/{}/{}/releases/latest", self.base, owner, repo)
                }
                (Identifier::Repo { repo, .. }, MetadataKind::Contributors) => {
                    format!("{}/repos/{}/{}/contributors?per_page=1&anon=1", self.base, owner, repo)
                }
                _ => format!("{}/users/{}", self.base, owner),
            }
        }

        async fn get(&self, url: &str) -> std::result::Result<reqwest::Response, FailureReason> {
            let mut request = self
                .client
                .get(url)
                .header(USER_AGENT, &self.user_agent)
                .header(ACCEPT, "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28");

            if let Some(token) = &self.token {
                request = request.header(AUTHORIZATION, format!("Bearer {}", token));
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    FailureReason::Timeout
                } else {
                    FailureReason::Network { message: e.to_string() }
                }
            })?;

            check_status(response.status(), response.headers())?;
            Ok(response)
        }
    }

    impl MetadataSource for GithubSource {
        async fn fetch(&self, key: &MetadataKey) -> std::result::Result<MetadataValue, FailureReason> {
            let url = self.endpoint(key);
            tracing::debug!(key = %key, url = %url, "requesting metadata");
            let response = self.get(&url).await?;

            if key.kind == MetadataKind::Contributors {
                // An empty repository answers 204 with no body.
                if response.status() == StatusCode::NO_CONTENT {
                    return Ok(MetadataValue::Count(0));
                }
                if let Some(count) = last_page(response.headers()) {
                    return Ok(MetadataValue::Count(count));
                }
            }

            let body: Value = response
                .json()
                .await
                .map_err(|_| FailureReason::MalformedResponse { field: "body".to_string() })?;

            extract_value(key.kind, &body)
        }
    }

    /// Maps non-success statuses, distinguishing rate limits.
    pub(crate) fn check_status(status: StatusCode, headers: &HeaderMap) -> std::result::Result<(), FailureReason> {
        if status.is_success() {
            return Ok(());
        }

        let remaining = headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(str::trim);

        if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && remaining == Some("0")) {
            let reset = headers
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(FailureReason::RateLimited { reset });
        }

        Err(FailureReason::Http { status: status.as_u16() })
    }

    /// Page number of the `rel="last"` link, which equals the item count
    /// when requesting one item per page.
    pub(crate) fn last_page(headers: &HeaderMap) -> Option<u64> {
        let link = headers.get(LINK)?.to_str().ok()?;
        let re = Regex::new(r#"<[^>]*[?&]page=(\d+)[^>]*>\s*;\s*rel="last""#).unwrap();
        re.captures(link)?.get(1)?.as_str().parse().ok()
    }

    /// Reads the field for `kind` out of a JSON body.
    pub(crate) fn extract_value(kind: MetadataKind, body: &Value) -> std::result::Result<MetadataValue, FailureReason> {
        let missing = |field: &str| FailureReason::MalformedResponse { field: field.to_string() };

        match kind {
            MetadataKind::Contributors => body
                .as_array()
                .map(|items| MetadataValue::Count(items.len() as u64))
                .ok_or_else(|| missing("contributors")),
            MetadataKind::LatestVersion => body
                .get("tag_name")
                .and_then(Value::as_str)
                .filter(|tag| !tag.is_empty())
                .map(|tag| MetadataValue::Text(tag.to_string()))
                .ok_or_else(|| missing("tag_name")),
            MetadataKind::Stargazers => count_field(body, "stargazers_count"),
            MetadataKind::Watchers => count_field(body, "subscribers_count"),
            MetadataKind::RepoCount => count_field(body, "public_repos"),
        }
    }

    fn count_field(body: &Value, field: &str) -> std::result::Result<MetadataValue, FailureReason> {
        body.get(field)
            .and_then(Value::as_u64)
            .map(MetadataValue::Count)
            .ok_or_else(|| FailureReason::MalformedResponse { field: field.to_string() })
    }

}
