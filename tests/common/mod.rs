//! Common test utilities for docfetch integration tests

#![allow(dead_code)]

use docfetch::{DocumentFetcher, FetchConfig};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// HTML page with a title, a heading and one relative link
pub fn page(title: &str) -> String {
    format!(
        "<!doctype html><html><head><title>{title}</title></head>\
         <body><h1>{title}</h1><a href=\"next\">next</a></body></html>"
    )
}

/// Serve `page(title)` at `route`
pub async fn mount_page(server: &MockServer, route: &str, title: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(page(title)),
        )
        .mount(server)
        .await;
}

/// Serve `page(title)` at `route` after `delay`
pub async fn mount_slow_page(server: &MockServer, route: &str, title: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(page(title))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Absolute URL of `route` on the mock server
pub fn url(server: &MockServer, route: &str) -> String {
    format!("{}{}", server.uri(), route)
}

/// Config with short timeouts suitable for local mock servers
pub fn test_config() -> FetchConfig {
    FetchConfig {
        request_timeout: Duration::from_secs(10),
        connect_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

/// Fetcher over the real reqwest transport
pub fn fetcher() -> DocumentFetcher {
    DocumentFetcher::new(test_config()).unwrap()
}
