use std::collections::HashMap;
use std::time::Duration;

use encoding_rs::Encoding;
use reqwest::{Client, ClientBuilder, StatusCode, header::RETRY_AFTER};
use scraper::{Html, Selector};
use url::Url;

use crate::error::{CrawlError, CrawlErrorCause};
use crate::url_handler::{has_supported_scheme, normalize_url, resolve_href};

const SUPPORTED_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml", "application/xml"];

const MAX_RETRY_ATTEMPTS: u8 = 10;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);
const CHARSET_SNIFF_WINDOW: usize = 1024;

/// Response metadata, kept regardless of whether the body was decoded.
///
/// `headers` carries every response header verbatim (lower-cased names),
/// so that the indexer can derive `mod_time`/`size` from `Last-Modified`,
/// `Date`, and `Content-Length` without the crawler needing to know about
/// those semantics itself.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: StatusCode,
    pub final_url: Url,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
}

/// The outcome of fetching and (if applicable) parsing one page.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub meta: ResponseMeta,
    pub content: Option<String>,
    pub outlinks: Vec<Url>,
}

pub fn build_client() -> Client {
    ClientBuilder::new()
        .user_agent(crate::USER_AGENT)
        // Reduce bandwidth usage; compliant with wikimedia's robot policy: https://wikitech.wikimedia.org/wiki/Robot_policy#Generally_applicable_rules
        .gzip(true)
        .timeout(Duration::from_secs(15))
        .build()
        .expect("Creating a `reqwest::Client` should not throw an error.")
}

/// Fetch `url`, retrying transient `429` responses, and parse any supported
/// HTML-family body into outlinks. Non-success statuses and unsupported
/// content types are reported through `meta` with `content: None` rather
/// than as errors — only transport/decode failures are errors.
pub async fn crawl(client: &Client, url: Url) -> Result<CrawlOutcome, CrawlError> {
    let resp = get_with_retry(client, url.clone()).await?;

    let status = resp.status();
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let headers = response_headers(&resp);
    let final_url = normalize_url(resp.url().clone());

    if !status.is_success() || !content_type_is_supported(content_type.as_deref()) {
        return Ok(CrawlOutcome {
            meta: ResponseMeta { status, final_url, content_type, headers },
            content: None,
            outlinks: Vec::new(),
        });
    }

    let bytes = resp.bytes().await.map_err(|e| CrawlError { url: url.clone(), cause: e.into() })?;

    let body = decode_body(&bytes, content_type.as_deref());
    let html = Html::parse_document(&body);
    let outlinks = extract_outlinks(&html, &final_url);

    Ok(CrawlOutcome {
        meta: ResponseMeta { status, final_url, content_type, headers },
        content: Some(body),
        outlinks,
    })
}

fn response_headers(resp: &reqwest::Response) -> HashMap<String, String> {
    resp.headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_owned(), v.to_owned())))
        .collect()
}

async fn get_with_retry(client: &Client, url: Url) -> Result<reqwest::Response, CrawlError> {
    let mut resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| CrawlError { url: url.clone(), cause: e.into() })?;

    let mut attempts = 0;
    while resp.status() == StatusCode::TOO_MANY_REQUESTS && attempts < MAX_RETRY_ATTEMPTS {
        let delay = retry_delay(&resp, &url)?;
        if delay > MAX_RETRY_DELAY {
            return Err(CrawlError { url, cause: CrawlErrorCause::RetryBudgetExhausted(delay) });
        }
        tokio::time::sleep(delay).await;

        resp = client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CrawlError { url: url.clone(), cause: e.into() })?;
        attempts += 1;
    }

    Ok(resp)
}

fn retry_delay(resp: &reqwest::Response, url: &Url) -> Result<Duration, CrawlError> {
    let header = resp.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()).map(str::to_owned);

    match header.as_deref().map(str::parse::<u64>) {
        Some(Ok(secs)) => Ok(Duration::from_secs(secs)),
        _ => Err(CrawlError { url: url.clone(), cause: CrawlErrorCause::InvalidRetryAfter(header) }),
    }
}

fn content_type_is_supported(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else { return false };
    let mime = content_type.split(';').next().unwrap_or("").trim().to_lowercase();
    SUPPORTED_CONTENT_TYPES.contains(&mime.as_str())
}

/// Decode a response body following the fallback chain: explicit
/// `Content-Type` charset, then a sniff of `<meta charset>` /
/// `<meta http-equiv="Content-Type">` within the first KiB, then UTF-8 with
/// replacement.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Some(label) = content_type.and_then(charset_from_content_type)
        && let Some(encoding) = Encoding::for_label(label.as_bytes())
    {
        return encoding.decode(bytes).0.into_owned();
    }

    if let Some(label) = sniff_meta_charset(bytes)
        && let Some(encoding) = Encoding::for_label(label.as_bytes())
    {
        return encoding.decode(bytes).0.into_owned();
    }

    encoding_rs::UTF_8.decode(bytes).0.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .find_map(|param| param.trim().strip_prefix("charset=").map(|v| v.trim_matches('"').to_owned()))
}

fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    let window = &bytes[..bytes.len().min(CHARSET_SNIFF_WINDOW)];
    let head = String::from_utf8_lossy(window).to_lowercase();

    if let Some(idx) = head.find("charset=") {
        let rest = &head[idx + "charset=".len()..];
        let rest = rest.trim_start_matches(['"', '\'']);
        let end = rest.find(|c: char| c == '"' || c == '\'' || c == ' ' || c == '>' || c == ';').unwrap_or(rest.len());
        let label = rest[..end].trim();
        if !label.is_empty() {
            return Some(label.to_owned());
        }
    }
    None
}

fn extract_outlinks(html: &Html, base_url: &Url) -> Vec<Url> {
    let selector = Selector::parse("a").expect("Parsing `a` selector should not throw an error.");

    html.select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_href(base_url, href))
        .filter(has_supported_scheme)
        .map(normalize_url)
        .collect()
}
