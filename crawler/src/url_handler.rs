use url::Url;

/// Normalize a url by stripping any passive parameters that do not change
/// the page content.
///
/// Also strips fragment identifiers (e.g. `https://example.com/data.csv#row=4`
/// is normalized as `https://example.com/data.csv`), since these usually do
/// not change page content.
pub fn normalize_url(mut url: Url) -> Url {
    if url.query().is_none() && url.fragment().is_none() {
        return url;
    }

    let params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(query, _)| !query_is_passive(query))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if params.is_empty() {
        url.set_query(None);
    } else {
        let query = encode_query_pairs(&params);
        url.set_query(Some(&query));
    }
    url.set_fragment(None);

    url
}

fn encode_query_pairs(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", url::form_urlencoded::byte_serialize(k.as_bytes()).collect::<String>(), url::form_urlencoded::byte_serialize(v.as_bytes()).collect::<String>()))
        .collect::<Vec<_>>()
        .join("&")
}

fn query_is_passive(query: &str) -> bool {
    query.contains("utm") || query == "id" || query == "t"
}

/// Resolve a possibly-relative href found in a page's HTML against the
/// page's final response URL.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    if href.starts_with("https://") || href.starts_with("http://") {
        Url::parse(href).ok()
    } else {
        base.join(href).ok()
    }
}

/// Whether `url`'s scheme is one the crawler will fetch.
pub fn has_supported_scheme(url: &Url) -> bool {
    url.scheme() == "http" || url.scheme() == "https"
}
