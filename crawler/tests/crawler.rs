use std::time::Instant;

use crawler::{build_client, crawl, error::CrawlErrorCause};
use httpmock::Method::GET;
use url::Url;

#[tokio::test]
async fn successful_fetch_completes_quickly() {
    let server = httpmock::MockServer::start();
    server.mock(|when, then| {
        when.method(GET);
        then.status(200).header("content-type", "text/html").body("<html></html>");
    });

    let client = build_client();
    let start = Instant::now();
    let outcome = crawl(&client, Url::parse(&server.base_url()).unwrap()).await.unwrap();

    assert!(outcome.meta.status.is_success());
    assert!(start.elapsed().as_secs() < 5);
}

#[tokio::test]
async fn retry_budget_exhausted_surfaces_as_error() {
    let server = httpmock::MockServer::start();
    server.mock(|when, then| {
        when.method(GET);
        then.status(429).header("content-type", "text/html").header("retry-after", "3600");
    });

    let client = build_client();
    let err = crawl(&client, Url::parse(&server.base_url()).unwrap()).await.unwrap_err();

    assert!(matches!(err.cause, CrawlErrorCause::RetryBudgetExhausted(_)));
}
