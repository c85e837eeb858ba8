//! Deterministic textual dump of the index store, for golden-output testing.
//!
//! One paragraph per page: title (or `(no title)`), URL, mod_time and size,
//! the page's most frequent keywords, and its outbound links in
//! lexicographic order. Paragraphs are joined by a rule of 100 dashes.
//! Identical store contents and parameters always produce byte-identical
//! output.

use std::fmt::Write as _;

use chrono::SecondsFormat;
use store::{PageRow, Store, StoreError};

const SEPARATOR: &str = "----------------------------------------------------------------------------------------------\n";

/// Render up to `count` pages (in id order) into a single string.
///
/// `keyword_count` bounds how many keywords are listed per page, sorted by
/// descending combined frequency then ascending content; `link_count` bounds
/// how many outbound links are listed, in lexicographic order. A negative
/// value for any of `count`/`keyword_count`/`link_count` means "all".
pub async fn render(
    store: &Store,
    count: i64,
    keyword_count: i64,
    link_count: i64,
) -> Result<String, StoreError> {
    let pages = store.iterate_pages(count).await?;

    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            out.push_str(SEPARATOR);
        }
        write_page(store, &mut out, page, keyword_count, link_count).await?;
    }
    Ok(out)
}

async fn write_page(
    store: &Store,
    out: &mut String,
    page: &PageRow,
    keyword_count: i64,
    link_count: i64,
) -> Result<(), StoreError> {
    writeln!(out, "{}", page.title.as_deref().unwrap_or("(no title)")).expect("write to String cannot fail");
    writeln!(out, "{}", page.url).expect("write to String cannot fail");

    let mod_time = page.mod_time.to_rfc3339_opts(SecondsFormat::Secs, true);
    writeln!(out, "{mod_time}, {}", page.size).expect("write to String cannot fail");

    let keywords = store.page_keywords(page.id, keyword_count).await?;
    let mut keyword_sep = "";
    for (word, frequency) in &keywords {
        write!(out, "{keyword_sep}{word} {frequency}").expect("write to String cannot fail");
        keyword_sep = "; ";
    }
    out.push('\n');

    let mut links = store.outlinks(page.id).await?;
    if link_count >= 0 {
        links.truncate(link_count as usize);
    }
    let mut link_sep = "";
    for link in &links {
        write!(out, "{link_sep}{link}").expect("write to String cannot fail");
        link_sep = "\n";
    }
    out.push('\n');

    Ok(())
}
