//! Prober / ConditionalFetcher against a local mock server

use oddsfeed_monitor::common::MonitorError;
use oddsfeed_monitor::http::{ConditionalFetcher, ProbeFailurePolicy, Prober};
use oddsfeed_monitor::store::EndpointStateCache;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn test_probe_detects_changed_etag() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/api/matches"))
        .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"v1\""))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/api/matches"))
        .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"v2\""))
        .mount(&server)
        .await;

    let cache = EndpointStateCache::new();
    let prober = Prober::new(client(), cache.clone(), ProbeFailurePolicy::AssumeChanged);
    let url = format!("{}/api/matches", server.uri());

    let first = prober.probe(&url).await;
    assert!(first.has_changes, "first probe has nothing to compare with");
    assert_eq!(first.etag.as_deref(), Some("\"v1\""));
    assert_eq!(first.status, Some(200));

    let second = prober.probe(&url).await;
    assert!(!second.has_changes);
    assert_eq!(second.content_hash, first.content_hash);

    let third = prober.probe(&url).await;
    assert!(third.has_changes);
    assert_eq!(
        cache.get(&url).unwrap().content_hash,
        third.content_hash
    );
    assert!(cache.get(&url).unwrap().last_probe.is_some());
}

#[tokio::test]
async fn test_probe_error_status_follows_policy() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let url = format!("{}/api/matches", server.uri());

    let cache = EndpointStateCache::new();
    let changed = Prober::new(client(), cache.clone(), ProbeFailurePolicy::AssumeChanged)
        .probe(&url)
        .await;
    assert!(changed.is_failure());
    assert!(changed.has_changes);
    assert_eq!(changed.status, Some(503));
    assert!(cache.get(&url).is_none(), "failed probe must not touch the cache");

    let unchanged = Prober::new(client(), cache, ProbeFailurePolicy::AssumeUnchanged)
        .probe(&url)
        .await;
    assert!(unchanged.is_failure());
    assert!(!unchanged.has_changes);
}

#[tokio::test]
async fn test_fetch_200_stores_validators() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/matches"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"abc\"")
                .insert_header("last-modified", "Wed, 01 Jan 2025 00:00:00 GMT")
                .set_body_raw(b"[]".to_vec(), "application/json"),
        )
        .mount(&server)
        .await;

    let cache = EndpointStateCache::new();
    let fetcher = ConditionalFetcher::new(client(), cache.clone());
    let url = format!("{}/api/matches", server.uri());

    let resp = fetcher.fetch(&url, None).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body.as_deref(), Some(&b"[]"[..]));
    assert_eq!(resp.content_type.as_deref(), Some("application/json"));

    let state = cache.get(&url).unwrap();
    assert_eq!(state.etag.as_deref(), Some("\"abc\""));
    assert_eq!(
        state.last_modified.as_deref(),
        Some("Wed, 01 Jan 2025 00:00:00 GMT")
    );
    assert!(state.last_fetch.is_some());
}

#[tokio::test]
async fn test_fetch_sends_cached_validators_and_accepts_304() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/matches"))
        .and(header("if-none-match", "\"abc\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    let cache = EndpointStateCache::new();
    let url = format!("{}/api/matches", server.uri());
    cache.update(&url, |s| s.etag = Some("\"abc\"".to_string()));

    let resp = ConditionalFetcher::new(client(), cache)
        .fetch(&url, None)
        .await
        .unwrap();
    assert!(resp.is_not_modified());
    assert!(resp.body.is_none());
}

#[tokio::test]
async fn test_fetch_other_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let cache = EndpointStateCache::new();
    let url = format!("{}/api/gone", server.uri());
    let err = ConditionalFetcher::new(client(), cache.clone())
        .fetch(&url, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::Status(404)));
    assert!(cache.get(&url).and_then(|s| s.last_fetch).is_none());
}
