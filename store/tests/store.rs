use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use store::{IndexedPage, Stream, WordOccurrence};
use url::Url;

mod common;

fn occurrence(positions: Vec<u32>, tf_normalized: f32) -> WordOccurrence {
    WordOccurrence::new(positions, tf_normalized).unwrap()
}

fn page(url: &str) -> IndexedPage {
    IndexedPage {
        url: Url::parse(url).unwrap(),
        mod_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        size: 100,
        raw_text: String::new(),
        plaintext: String::new(),
        title: None,
        links: Vec::new(),
        word_occurrences: HashMap::new(),
        word_occurrences_title: HashMap::new(),
    }
}

#[tokio::test]
async fn index_page_inserts_a_new_page() {
    let (_container, store) = common::setup().await;

    let mut p = page("https://example.com/");
    p.title = Some("Example".into());
    p.word_occurrences.insert("hello".into(), occurrence(vec![0, 3], 1.0));

    let inserted = store.index_page(p).await.unwrap();
    assert!(inserted);
    assert_eq!(store.count_pages().await.unwrap(), 1);
}

#[tokio::test]
async fn index_page_skips_stale_reindex_and_preserves_existing_state() {
    let (_container, store) = common::setup().await;

    let mut first = page("https://example.com/");
    first.mod_time = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
    first.title = Some("Original".into());
    first.word_occurrences.insert("alpha".into(), occurrence(vec![0], 1.0));
    store.index_page(first).await.unwrap();

    let mut stale = page("https://example.com/");
    stale.mod_time = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    stale.title = Some("Stale".into());
    stale.word_occurrences.insert("beta".into(), occurrence(vec![0], 1.0));

    let updated = store.index_page(stale).await.unwrap();
    assert!(!updated);

    let rows = store.iterate_pages(-1).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title.as_deref(), Some("Original"));

    let keywords = store.page_keywords(rows[0].id, -1).await.unwrap();
    assert_eq!(keywords, vec![("alpha".to_string(), 1)]);
}

#[tokio::test]
async fn index_page_rebuilds_word_rows_on_fresh_reindex() {
    let (_container, store) = common::setup().await;

    let mut first = page("https://example.com/");
    first.mod_time = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    first.word_occurrences.insert("alpha".into(), occurrence(vec![0], 1.0));
    store.index_page(first).await.unwrap();

    let mut second = page("https://example.com/");
    second.mod_time = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
    second.word_occurrences.insert("beta".into(), occurrence(vec![0, 1], 1.0));

    let updated = store.index_page(second).await.unwrap();
    assert!(updated);

    let rows = store.iterate_pages(-1).await.unwrap();
    let keywords = store.page_keywords(rows[0].id, -1).await.unwrap();
    assert_eq!(keywords, vec![("beta".to_string(), 2)]);
}

#[tokio::test]
async fn index_page_rejects_oversize_url() {
    let (_container, store) = common::setup().await;

    let long_path = "a".repeat(3000);
    let mut p = page("https://example.com/");
    p.url = Url::parse(&format!("https://example.com/{long_path}")).unwrap();

    let err = store.index_page(p).await.unwrap_err();
    assert!(matches!(err, store::StoreError::Validation(_)));
}

#[tokio::test]
async fn iterate_pages_orders_by_id_and_respects_limit() {
    let (_container, store) = common::setup().await;

    store.index_page(page("https://a.example/")).await.unwrap();
    store.index_page(page("https://b.example/")).await.unwrap();
    store.index_page(page("https://c.example/")).await.unwrap();

    let all = store.iterate_pages(-1).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].id < w[1].id));

    let limited = store.iterate_pages(2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id, all[0].id);
    assert_eq!(limited[1].id, all[1].id);
}

#[tokio::test]
async fn page_keywords_combines_streams_and_orders_by_frequency_then_content() {
    let (_container, store) = common::setup().await;

    let mut p = page("https://example.com/");
    p.word_occurrences.insert("alpha".into(), occurrence(vec![0], 1.0));
    p.word_occurrences.insert("beta".into(), occurrence(vec![0, 1], 1.0));
    p.word_occurrences_title.insert("beta".into(), occurrence(vec![0], 1.0));
    p.word_occurrences.insert("gamma".into(), occurrence(vec![0, 1], 1.0));
    store.index_page(p).await.unwrap();

    let rows = store.iterate_pages(-1).await.unwrap();
    let keywords = store.page_keywords(rows[0].id, -1).await.unwrap();

    assert_eq!(
        keywords,
        vec![("beta".to_string(), 3), ("gamma".to_string(), 2), ("alpha".to_string(), 1)]
    );

    let limited = store.page_keywords(rows[0].id, 1).await.unwrap();
    assert_eq!(limited, vec![("beta".to_string(), 3)]);
}

#[tokio::test]
async fn tf_many_and_doc_frequency_many_are_stream_scoped() {
    let (_container, store) = common::setup().await;

    let mut a = page("https://a.example/");
    a.word_occurrences.insert("alpha".into(), occurrence(vec![0], 0.5));
    store.index_page(a).await.unwrap();

    let mut b = page("https://b.example/");
    b.word_occurrences_title.insert("alpha".into(), occurrence(vec![0], 0.8));
    store.index_page(b).await.unwrap();

    let pages = store.iterate_pages(-1).await.unwrap();
    let page_ids: Vec<i32> = pages.iter().map(|p| p.id).collect();
    let word_ids = store.word_ids_for_stems(&["alpha".to_string()]).await.unwrap();

    let tf_plaintext = store.tf_many(&page_ids, &word_ids, Stream::Plaintext).await.unwrap();
    assert_eq!(tf_plaintext[0][0], 0.5);
    assert_eq!(tf_plaintext[1][0], 0.0);

    let tf_title = store.tf_many(&page_ids, &word_ids, Stream::Title).await.unwrap();
    assert_eq!(tf_title[0][0], 0.0);
    assert_eq!(tf_title[1][0], 0.8);

    let df_plaintext = store.doc_frequency_many(&word_ids, Stream::Plaintext).await.unwrap();
    assert_eq!(df_plaintext, vec![1]);
    let df_title = store.doc_frequency_many(&word_ids, Stream::Title).await.unwrap();
    assert_eq!(df_title, vec![1]);
}

#[tokio::test]
async fn candidate_pages_finds_any_page_containing_a_word_in_either_stream() {
    let (_container, store) = common::setup().await;

    let mut a = page("https://a.example/");
    a.word_occurrences.insert("alpha".into(), occurrence(vec![0], 1.0));
    store.index_page(a).await.unwrap();

    let mut b = page("https://b.example/");
    b.word_occurrences_title.insert("beta".into(), occurrence(vec![0], 1.0));
    store.index_page(b).await.unwrap();

    store.index_page(page("https://c.example/")).await.unwrap();

    let word_ids = store.word_ids_for_stems(&["alpha".to_string(), "beta".to_string()]).await.unwrap();
    let candidates = store.candidate_pages(&word_ids).await.unwrap();

    assert_eq!(candidates.len(), 2);
    assert!(candidates.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn word_ids_for_stems_omits_unknown_stems() {
    let (_container, store) = common::setup().await;

    let mut p = page("https://example.com/");
    p.word_occurrences.insert("alpha".into(), occurrence(vec![0], 1.0));
    store.index_page(p).await.unwrap();

    let ids = store.word_ids_for_stems(&["alpha".to_string(), "nonexistent".to_string()]).await.unwrap();
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn pages_by_ids_preserves_requested_order_and_skips_missing() {
    let (_container, store) = common::setup().await;

    store.index_page(page("https://a.example/")).await.unwrap();
    store.index_page(page("https://b.example/")).await.unwrap();

    let all = store.iterate_pages(-1).await.unwrap();
    let a_id = all.iter().find(|p| p.url.as_str() == "https://a.example/").unwrap().id;
    let b_id = all.iter().find(|p| p.url.as_str() == "https://b.example/").unwrap().id;

    let missing_id = a_id.max(b_id) + 1000;
    let rows = store.pages_by_ids(&[b_id, missing_id, a_id]).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, b_id);
    assert_eq!(rows[1].id, a_id);
}

#[tokio::test]
async fn outlinks_are_returned_in_lexicographic_order() {
    let (_container, store) = common::setup().await;

    let mut p = page("https://example.com/");
    p.links = vec![
        Url::parse("https://z.example/").unwrap(),
        Url::parse("https://a.example/").unwrap(),
        Url::parse("https://m.example/").unwrap(),
    ];
    store.index_page(p).await.unwrap();

    let rows = store.iterate_pages(-1).await.unwrap();
    let links = store.outlinks(rows[0].id).await.unwrap();

    let as_strs: Vec<String> = links.iter().map(Url::to_string).collect();
    assert_eq!(as_strs, vec!["https://a.example/", "https://m.example/", "https://z.example/"]);
}

#[tokio::test]
async fn get_or_create_urls_and_words_are_idempotent_and_order_preserving() {
    let (_container, store) = common::setup().await;

    let urls = vec![Url::parse("https://a.example/").unwrap(), Url::parse("https://b.example/").unwrap()];
    let first_ids = store.get_or_create_urls(&urls).await.unwrap();
    let second_ids = store.get_or_create_urls(&urls).await.unwrap();
    assert_eq!(first_ids, second_ids);

    let stems = vec!["alpha".to_string(), "beta".to_string()];
    let first_word_ids = store.get_or_create_words(&stems).await.unwrap();
    let second_word_ids = store.get_or_create_words(&stems).await.unwrap();
    assert_eq!(first_word_ids, second_word_ids);
}

#[tokio::test]
async fn get_or_create_words_rejects_oversize_word() {
    let (_container, store) = common::setup().await;

    let too_long = "a".repeat(256);
    let err = store.get_or_create_words(&[too_long]).await.unwrap_err();
    assert!(matches!(err, store::StoreError::Validation(_)));
}
