//! Library API integration tests
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use marginalia_core::metadata::{EntryState, MetadataKey};
use marginalia_core::scroll::ScrollSample;
use marginalia_core::*;

fn get_fixture_path(name: &str) -> String {
    format!("../../tests/fixtures/{}", name)
}

fn fixture(name: &str) -> String {
    std::fs::read_to_string(get_fixture_path(name)).unwrap()
}

#[derive(Clone, Copy)]
enum Api {
    Healthy,
    RateLimitedUsers,
}

struct StubApi {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl StubApi {
    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn stop(self) {
        let _ = self.shutdown.send(());
        self.handle.join().unwrap();
    }
}

fn spawn_github_stub(mode: Api) -> StubApi {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let base_url = format!("http://{}", server.server_addr());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let (shutdown, shutdown_rx) = mpsc::channel::<()>();

    let seen = Arc::clone(&requests);
    let link_base = base_url.clone();
    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            let url = request.url().to_string();
            seen.lock().unwrap().push(url.clone());

            let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
            let (status, body) = match (mode, url.as_str()) {
                (_, "/repos/acme/widgets") => (200, r#"{"stargazers_count": 48213, "subscribers_count": 310}"#),
                (_, "/repos/acme/widgets/releases/latest") => (200, r#"{"tag_name": "v3.1.0"}"#),
                (_, "/repos/acme/widgets/contributors?per_page=1&anon=1") => {
                    headers.push((
                        "Link".to_string(),
                        format!(
                            r#"<{0}/repositories/7/contributors?per_page=1&anon=1&page=2>; rel="next", <{0}/repositories/7/contributors?per_page=1&anon=1&page=57>; rel="last""#,
                            link_base
                        ),
                    ));
                    (200, r#"[{"login": "first"}]"#)
                }
                (Api::Healthy, "/users/acme") => (200, r#"{"public_repos": 12}"#),
                (Api::RateLimitedUsers, "/users/acme") => {
                    headers.push(("x-ratelimit-remaining".to_string(), "0".to_string()));
                    headers.push(("x-ratelimit-reset".to_string(), "1700000000".to_string()));
                    (403, r#"{"message": "API rate limit exceeded"}"#)
                }
                _ => (404, r#"{"message": "Not Found"}"#),
            };

            let mut response = tiny_http::Response::from_string(body).with_status_code(status);
            for (name, value) in headers {
                let header = tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("build header");
                response = response.with_header(header);
            }
            let _ = request.respond(response);
        }
    });

    StubApi { base_url, requests, shutdown, handle }
}

fn config_for(stub: &StubApi) -> MarginaliaConfig {
    MarginaliaConfig::builder().api_base(&stub.base_url).timeout_ms(5_000).build()
}

#[test]
fn test_static_augmentation_of_docs_page() {
    let augmented = augment_static(&fixture("docs_page.html")).unwrap();

    assert_eq!(augmented.toc.len(), 1);
    let root = &augmented.toc[0];
    assert_eq!(root.id, "top");
    let ids: Vec<&str> = root.children.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["installation", "usage", "usage-1", "section-7"]);
    assert_eq!(root.children[0].children[0].id, "requirements");
    assert_eq!(root.children[1].children[0].id, "configuration");

    assert!(augmented.html.contains(r#"<h1 id="top">"#));
    assert!(augmented.html.contains(r#"<h2 id="usage-1">"#));
    assert!(augmented.html.contains(r#"<h2 id="section-7">"#));
    assert!(augmented.html.contains(r#"<nav class="page-toc" data-toc><ul class="toc">"#));

    let reading = augmented.reading.unwrap();
    assert!(reading.word_count > 50);
    assert_eq!(reading.estimated_minutes, 1);
    assert!(augmented.html.contains(">1 minute</span>"));
}

#[test]
fn test_hidden_and_script_text_is_not_counted() {
    let augmented = augment_static(&fixture("docs_page.html")).unwrap();
    let with_hidden = augmented.reading.unwrap().word_count;

    let stripped = fixture("docs_page.html")
        .replace(r#"<script>console.log("this script is not prose and is never counted");</script>"#, "")
        .replace("<div hidden><p>Draft notes that readers never see.</p></div>", "");
    let without_hidden = augment_static(&stripped).unwrap().reading.unwrap().word_count;

    assert_eq!(with_hidden, without_hidden);
}

#[test]
fn test_static_augmentation_is_idempotent() {
    let first = augment_static(&fixture("docs_page.html")).unwrap();
    let second = augment_static(&first.html).unwrap();

    assert_eq!(first.toc, second.toc);
    assert_eq!(first.reading, second.reading);
    assert_eq!(first.html, second.html);
}

#[test]
fn test_page_without_container_is_untouched() {
    let html = fixture("no_container.html");
    let augmented = augment_static(&html).unwrap();

    assert!(augmented.toc.is_empty());
    assert!(augmented.reading.is_none());
    assert!(augmented.html.contains("<p>Nothing to index here.</p>"));
    assert!(augmented.html.contains("<span data-reading-time>unknown</span>"));
    assert!(augmented.html.contains("<h2>Not inside main</h2>"));
}

#[test]
fn test_malformed_target_fails_before_requests() {
    let err = Page::ready(&fixture("broken_target.html"), MarginaliaConfig::default()).unwrap_err();
    assert!(matches!(err, MarginaliaError::InvalidTarget { index: 1, .. }));
}

#[tokio::test]
async fn test_github_metadata_resolution() {
    let stub = spawn_github_stub(Api::Healthy);
    let config = config_for(&stub);

    let mut page = Page::ready(&fixture("docs_page.html"), config.clone()).unwrap();
    let client = MetadataClient::github(config.metadata.clone()).unwrap();
    let resolutions = page.resolve_metadata(&client).await.unwrap().to_vec();

    assert_eq!(resolutions.len(), 5);
    assert!(resolutions.iter().all(|r| !r.failed));

    let mut requests = stub.requests();
    requests.sort();
    assert_eq!(
        requests,
        vec![
            "/repos/acme/widgets",
            "/repos/acme/widgets/contributors?per_page=1&anon=1",
            "/repos/acme/widgets/releases/latest",
            "/users/acme",
        ]
    );

    let html = page.html();
    assert_eq!(html.matches(r#"data-gh-state="resolved">48,213</span>"#).count(), 2);
    assert!(html.contains(r#"data-gh-state="resolved">v3.1.0</span>"#));
    assert!(html.contains(r#"data-gh-state="resolved">57</span>"#));
    assert!(html.contains(r#"data-gh-state="resolved">12</span>"#));

    stub.stop();
}

#[tokio::test]
async fn test_rate_limit_degrades_only_affected_targets() {
    let stub = spawn_github_stub(Api::RateLimitedUsers);
    let config = config_for(&stub);

    let mut page = Page::ready(&fixture("docs_page.html"), config.clone()).unwrap();
    let client = MetadataClient::github(config.metadata.clone()).unwrap();
    page.resolve_metadata(&client).await.unwrap();

    let html = page.html();
    assert!(html.contains("data-gh-state=\"failed\">\u{2014}</span>"));
    assert_eq!(html.matches(r#"data-gh-state="resolved">48,213</span>"#).count(), 2);

    let entry = page.cache().get(&MetadataKey::owner(MetadataKind::RepoCount, "acme")).unwrap();
    assert_eq!(
        entry.state,
        EntryState::Failed { failure: FailureReason::RateLimited { reset: Some(1_700_000_000) } }
    );

    // No retry within the same page view.
    let before = stub.requests().len();
    page.resolve_metadata(&client).await.unwrap();
    assert_eq!(stub.requests().len(), before);

    stub.stop();
}

#[tokio::test]
async fn test_augmenter_with_github_and_report() {
    let stub = spawn_github_stub(Api::Healthy);
    let augmenter = Augmenter::new(config_for(&stub));

    let augmented = augmenter.augment_with_github(&fixture("docs_page.html")).await.unwrap();
    let report = augmented.report_json().unwrap();

    assert_eq!(report["metadata"].as_array().unwrap().len(), 4);
    assert!(report["metadata"].as_array().unwrap().iter().all(|e| e["state"] == "resolved"));
    assert_eq!(report["toggles"]["site-menu"], "closed");
    assert!(report.get("html").is_none());

    stub.stop();
}

#[test]
fn test_page_interaction_round_trip() {
    let mut page = Page::ready(&fixture("docs_page.html"), MarginaliaConfig::default()).unwrap();
    let start = Instant::now();

    for (i, offset) in [0, 30, 90, 140, 600].into_iter().enumerate() {
        page.scroll(ScrollSample::new(offset, 4000, 800), start + Duration::from_millis(16 * i as u64));
        page.frame();
    }
    page.toggle("site-menu", ToggleEvent::Activate);

    let html = page.render().unwrap();
    assert!(html.contains(r#"<body class="docs is-sticky">"#));
    assert!(html.contains(r#"<ul id="site-menu" class="site-menu is-open">"#));
    assert!(html.contains(r#"data-toggle="site-menu" aria-expanded="true""#));

    page.dismiss(ToggleEvent::Escape);
    page.scroll(ScrollSample::new(0, 4000, 800), start + Duration::from_secs(1));
    page.settle_scroll();

    let html = page.render().unwrap();
    assert!(html.contains(r#"<body class="docs">"#));
    assert!(html.contains(r#"<ul id="site-menu" class="site-menu">"#));
    assert!(html.contains(r#"aria-expanded="false""#));
}

#[test]
fn test_config_file_drives_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        [index]
        min_level = 2
        max_level = 2

        [reading]
        words_per_minute = 20
        singular = "min"
        plural = "mins"
        "#,
    )
    .unwrap();

    let config = MarginaliaConfig::load(&path).unwrap();
    let augmented = Augmenter::new(config).augment_static(&fixture("docs_page.html")).unwrap();

    let ids: Vec<&str> = augmented.toc.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["installation", "usage", "usage-1", "section-4"]);
    assert!(augmented.toc.iter().all(|n| n.children.is_empty()));

    let reading = augmented.reading.unwrap();
    assert!(reading.estimated_minutes > 1);
    assert!(augmented.html.contains(&format!(">{} mins</span>", reading.estimated_minutes)));
}
