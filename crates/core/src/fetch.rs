//! Reading rendered pages from URLs, files, and stdin.

use std::fs;
use std::path::PathBuf;

use crate::{MarginaliaError, Result};

/// HTTP settings for downloading a page.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout: 30, user_agent: concat!("marginalia/", env!("CARGO_PKG_VERSION")).to_string() }
    }
}

/// Where a page comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    Stdin,
    Url(String),
    File(PathBuf),
}

impl PageSource {
    /// `-` is stdin, `http://` and `https://` are URLs, anything else a path.
    pub fn parse(input: &str) -> Self {
        if input == "-" {
            PageSource::Stdin
        } else if input.starts_with("http://") || input.starts_with("https://") {
            PageSource::Url(input.to_string())
        } else {
            PageSource::File(PathBuf::from(input))
        }
    }
}

/// Downloads a page and returns its body.
///
/// Non-success statuses are errors; the page is never augmented from an
/// error document.
#[cfg(feature = "fetch")]
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
    use std::time::Duration;

    let parsed = url::Url::parse(url).map_err(|e| MarginaliaError::InvalidUrl(format!("{}: {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(MarginaliaError::InvalidUrl(format!("unsupported scheme `{}`", parsed.scheme())));
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(MarginaliaError::HttpError)?;

    tracing::debug!(url = %parsed, "fetching page");
    let response = client
        .get(parsed)
        .header("User-Agent", &config.user_agent)
        .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() { MarginaliaError::Timeout { timeout: config.timeout } } else { MarginaliaError::HttpError(e) }
        })?
        .error_for_status()?;

    Ok(response.text().await?)
}

pub fn fetch_file(path: &str) -> Result<String> {
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(MarginaliaError::FileNotFound(path));
    }
    Ok(fs::read_to_string(&path)?)
}

/// Reads stdin to EOF.
pub fn fetch_stdin() -> Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Reads a page from whichever source `input` names.
#[cfg(feature = "fetch")]
pub async fn fetch_input(input: &str, config: &FetchConfig) -> Result<String> {
    match PageSource::parse(input) {
        PageSource::Stdin => fetch_stdin(),
        PageSource::Url(url) => fetch_url(&url, config).await,
        PageSource::File(path) => fetch_file(&path.to_string_lossy()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_source_parse() {
        assert_eq!(PageSource::parse("-"), PageSource::Stdin);
        assert_eq!(PageSource::parse("https://example.com/docs"), PageSource::Url("https://example.com/docs".into()));
        assert_eq!(PageSource::parse("site/index.html"), PageSource::File(PathBuf::from("site/index.html")));
    }

    #[test]
    fn test_fetch_file_not_found() {
        let result = fetch_file("/nonexistent/path/index.html");
        assert!(matches!(result, Err(MarginaliaError::FileNotFound(_))));
    }

    #[test]
    fn test_fetch_file_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        fs::write(&path, "<main><h2>Hi</h2></main>").unwrap();
        assert_eq!(fetch_file(path.to_str().unwrap()).unwrap(), "<main><h2>Hi</h2></main>");
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_fetch_url_rejects_non_http() {
        let config = FetchConfig::default();
        assert!(matches!(fetch_url("not-a-url", &config).await, Err(MarginaliaError::InvalidUrl(_))));
        assert!(matches!(fetch_url("ftp://example.com/x", &config).await, Err(MarginaliaError::InvalidUrl(_))));
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_fetch_url_from_stub() {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let base_url = format!("http://{}", server.server_addr());
        let handle = std::thread::spawn(move || {
            let request = server.recv().unwrap();
            let response = tiny_http::Response::from_string("<main><p>served</p></main>");
            request.respond(response).unwrap();
        });

        let html = fetch_url(&format!("{}/page", base_url), &FetchConfig::default()).await.unwrap();
        assert!(html.contains("served"));
        handle.join().unwrap();
    }

    #[test]
    fn test_default_user_agent() {
        assert!(FetchConfig::default().user_agent.starts_with("marginalia/"));
    }
}
