use crawler::{build_client, crawl};
use criterion::{Criterion, criterion_group, criterion_main};
use httpmock::MockServer;
use url::Url;

const PAGE_HTML: &str = r#"<html><head><title>Bench page</title></head><body>
    <p>hippopotamus hippopotamus elephant ladder</p>
    <a href="/a">a</a><a href="/b">b</a><a href="/c">c</a>
</body></html>"#;

/// Benchmark a single fetch-and-parse round trip.
fn bench_crawl_one(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Creating tokio runtime should not throw an error.");

    c.bench_function("crawl_one_page", |b| {
        b.to_async(&runtime).iter_batched(
            || async {
                let server = MockServer::start_async().await;
                server
                    .mock_async(|when, then| {
                        when.method(httpmock::Method::GET);
                        then.status(200).header("content-type", "text/html").body(PAGE_HTML);
                    })
                    .await;
                (server, build_client())
            },
            |data| async move {
                let (server, client) = data.await;
                let url = Url::parse(&server.base_url()).expect("mock server url should parse.");
                crawl(&client, url).await.expect("`crawl` should not throw an error.");
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(40)
        .measurement_time(std::time::Duration::from_secs(15))
        .warm_up_time(std::time::Duration::from_secs(5));
    targets = bench_crawl_one
}

criterion_main!(benches);
