//! The persistent relational index store.
//!
//! Owns every persisted entity (`URL`, `Page`, `Word`, `PageWord`,
//! `WordPositions`/`WordPositionsTitle`) exclusively. `IndexedPage` values
//! produced by the indexer are moved into [`Store::index_page`]; nothing else
//! writes to these tables.

mod error;
mod model;

pub use error::StoreError;
pub use model::{IndexedPage, PageRow, Stream, WordOccurrence};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use model::{positions_from_string, positions_to_string};
use sqlx::{PgPool, Row};
use url::Url;

/// A handle onto the index store. Cheap to clone (wraps a connection pool).
///
/// The write path (`index_page`) is meant to be called through a single
/// caller-side mutex — this type performs no internal write-serialization
/// of its own, leaving concurrency control to the caller.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Store { pool }
    }

    /// Run embedded migrations, creating the schema if it does not already
    /// exist.
    pub async fn migrate(&self) {
        utils::migrate(&self.pool).await;
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Idempotently assign ids to every URL in `urls`, preserving input
    /// order in the returned sequence.
    pub async fn get_or_create_urls(&self, urls: &[Url]) -> Result<Vec<i32>, StoreError> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let contents: Vec<String> = urls.iter().map(Url::to_string).collect();

        sqlx::query("INSERT INTO url (content) SELECT * FROM UNNEST($1::text[]) ON CONFLICT (content) DO NOTHING")
            .bind(&contents)
            .execute(&self.pool)
            .await?;

        let mut ids = Vec::with_capacity(contents.len());
        for content in &contents {
            let id: i32 = sqlx::query_scalar("SELECT id FROM url WHERE content = $1")
                .bind(content)
                .fetch_one(&self.pool)
                .await?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Idempotently assign ids to every stem in `stems`, preserving input
    /// order in the returned sequence.
    pub async fn get_or_create_words(&self, stems: &[String]) -> Result<Vec<i32>, StoreError> {
        if stems.is_empty() {
            return Ok(Vec::new());
        }
        for stem in stems {
            if stem.len() > 255 {
                return Err(StoreError::Validation(format!(
                    "word content exceeds 255 characters: {stem}"
                )));
            }
        }

        sqlx::query("INSERT INTO word (content) SELECT * FROM UNNEST($1::text[]) ON CONFLICT (content) DO NOTHING")
            .bind(stems)
            .execute(&self.pool)
            .await?;

        let mut ids = Vec::with_capacity(stems.len());
        for stem in stems {
            let id: i32 = sqlx::query_scalar("SELECT id FROM word WHERE content = $1")
                .bind(stem)
                .fetch_one(&self.pool)
                .await?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Index a page, transactionally. Returns `Ok(false)` (no state change)
    /// if the page already exists with a `mod_time` greater than or equal to
    /// `page.mod_time`; otherwise upserts everything and returns `Ok(true)`.
    pub async fn index_page(&self, page: IndexedPage) -> Result<bool, StoreError> {
        if page.url.as_str().len() > 2047 {
            return Err(StoreError::Validation("url content exceeds 2047 characters".into()));
        }

        let mut tx = self.pool.begin().await?;

        let url_id = upsert_url(&mut tx, page.url.as_str()).await?;

        let mut link_ids = Vec::with_capacity(page.links.len());
        for link in &page.links {
            link_ids.push(upsert_url(&mut tx, link.as_str()).await?);
        }

        let existing_mod_time: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT mod_time FROM page WHERE url_id = $1")
                .bind(url_id)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(existing) = existing_mod_time
            && existing >= page.mod_time
        {
            tx.rollback().await?;
            return Ok(false);
        }

        let page_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO page (url_id, mod_time, size, raw_text, plaintext, title)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (url_id) DO UPDATE SET
                mod_time = EXCLUDED.mod_time,
                size = EXCLUDED.size,
                raw_text = EXCLUDED.raw_text,
                plaintext = EXCLUDED.plaintext,
                title = EXCLUDED.title
            RETURNING id
            "#,
        )
        .bind(url_id)
        .bind(page.mod_time)
        .bind(page.size)
        .bind(&page.raw_text)
        .bind(&page.plaintext)
        .bind(page.title.as_deref().unwrap_or(""))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM page_outlink WHERE page_id = $1")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;
        for link_id in &link_ids {
            sqlx::query("INSERT INTO page_outlink (page_id, url_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(page_id)
                .bind(link_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM page_word WHERE page_id = $1")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;

        let stems: Vec<String> = page
            .word_occurrences
            .keys()
            .chain(page.word_occurrences_title.keys())
            .cloned()
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();

        for stem in &stems {
            if stem.len() > 255 {
                return Err(StoreError::Validation(format!(
                    "word content exceeds 255 characters: {stem}"
                )));
            }
            sqlx::query("INSERT INTO word (content) VALUES ($1) ON CONFLICT (content) DO NOTHING")
                .bind(stem)
                .execute(&mut *tx)
                .await?;
        }

        for stem in &stems {
            let word_id: i32 = sqlx::query_scalar("SELECT id FROM word WHERE content = $1")
                .bind(stem)
                .fetch_one(&mut *tx)
                .await?;

            let page_word_id: i32 = sqlx::query_scalar(
                "INSERT INTO page_word (page_id, word_id) VALUES ($1, $2) RETURNING id",
            )
            .bind(page_id)
            .bind(word_id)
            .fetch_one(&mut *tx)
            .await?;

            if let Some(occ) = page.word_occurrences.get(stem) {
                insert_positions(&mut tx, "word_positions", page_word_id, occ).await?;
            }
            if let Some(occ) = page.word_occurrences_title.get(stem) {
                insert_positions(&mut tx, "word_positions_title", page_word_id, occ).await?;
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    pub async fn count_pages(&self) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM page").fetch_one(&self.pool).await?)
    }

    /// Iterate up to `limit` pages ordered by id. A negative `limit` means
    /// "all pages".
    pub async fn iterate_pages(&self, limit: i64) -> Result<Vec<PageRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT page.id, url.content AS url, page.mod_time, page.size, page.title, page.plaintext
            FROM page
            JOIN url ON url.id = page.url_id
            ORDER BY page.id
            LIMIT $1
            "#,
        )
        .bind(none_if_negative(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let url_str: String = row.try_get("url")?;
                let url = Url::parse(&url_str)
                    .map_err(|e| sqlx::Error::ColumnDecode { index: "url".into(), source: Box::new(e) })?;
                let title: String = row.try_get("title")?;
                Ok(PageRow {
                    id: row.try_get("id")?,
                    url,
                    mod_time: row.try_get("mod_time")?,
                    size: row.try_get::<i32, _>("size")? as i64,
                    title: if title.is_empty() { None } else { Some(title) },
                    plaintext: row.try_get("plaintext")?,
                    raw_title_html: None,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    /// Normalized term frequency for each `(page, word)` pair, in row-major
    /// `[page][word]` order, for the given stream.
    pub async fn tf_many(
        &self,
        page_ids: &[i32],
        word_ids: &[i32],
        stream: Stream,
    ) -> Result<Vec<Vec<f32>>, StoreError> {
        if page_ids.is_empty() || word_ids.is_empty() {
            return Ok(vec![vec![0.0; word_ids.len()]; page_ids.len()]);
        }
        let table = positions_table(stream);
        let query = format!(
            r#"
            SELECT page_word.page_id, page_word.word_id, wp.tf_normalized
            FROM page_word
            JOIN {table} wp ON wp.page_word_id = page_word.id
            WHERE page_word.page_id = ANY($1) AND page_word.word_id = ANY($2)
            "#
        );
        let rows = sqlx::query(&query).bind(page_ids).bind(word_ids).fetch_all(&self.pool).await?;

        let mut matrix = vec![vec![0.0f32; word_ids.len()]; page_ids.len()];
        for row in rows {
            let page_id: i32 = row.try_get("page_id")?;
            let word_id: i32 = row.try_get("word_id")?;
            let tf: f32 = row.try_get("tf_normalized")?;
            if let (Some(p), Some(w)) = (
                page_ids.iter().position(|&id| id == page_id),
                word_ids.iter().position(|&id| id == word_id),
            ) {
                matrix[p][w] = tf;
            }
        }
        Ok(matrix)
    }

    /// Number of pages containing each word in `word_ids`, for the given
    /// stream.
    pub async fn doc_frequency_many(
        &self,
        word_ids: &[i32],
        stream: Stream,
    ) -> Result<Vec<i64>, StoreError> {
        if word_ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = positions_table(stream);
        let query = format!(
            r#"
            SELECT page_word.word_id, COUNT(*) AS df
            FROM page_word
            JOIN {table} wp ON wp.page_word_id = page_word.id
            WHERE page_word.word_id = ANY($1)
            GROUP BY page_word.word_id
            "#
        );
        let rows = sqlx::query(&query).bind(word_ids).fetch_all(&self.pool).await?;

        let mut counts = vec![0i64; word_ids.len()];
        for row in rows {
            let word_id: i32 = row.try_get("word_id")?;
            let df: i64 = row.try_get("df")?;
            if let Some(idx) = word_ids.iter().position(|&id| id == word_id) {
                counts[idx] = df;
            }
        }
        Ok(counts)
    }

    pub async fn outlinks(&self, page_id: i32) -> Result<Vec<Url>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT url.content
            FROM page_outlink
            JOIN url ON url.id = page_outlink.url_id
            WHERE page_outlink.page_id = $1
            ORDER BY url.content
            "#,
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(content,)| Url::parse(&content).map_err(|e| StoreError::Validation(e.to_string())))
            .collect()
    }

    /// Word ids for the given stems that are already present in the store
    /// (stems that were never indexed resolve to nothing).
    pub async fn word_ids_for_stems(&self, stems: &[String]) -> Result<Vec<i32>, StoreError> {
        if stems.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(i32,)> = sqlx::query_as("SELECT id FROM word WHERE content = ANY($1)")
            .bind(stems)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Fetch specific pages by id, in the order `page_ids` was given.
    pub async fn pages_by_ids(&self, page_ids: &[i32]) -> Result<Vec<PageRow>, StoreError> {
        if page_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT page.id, url.content AS url, page.mod_time, page.size, page.title, page.plaintext
            FROM page
            JOIN url ON url.id = page.url_id
            WHERE page.id = ANY($1)
            "#,
        )
        .bind(page_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id: HashMap<i32, PageRow> = rows
            .into_iter()
            .map(|row| {
                let url_str: String = row.try_get("url")?;
                let url = Url::parse(&url_str)
                    .map_err(|e| sqlx::Error::ColumnDecode { index: "url".into(), source: Box::new(e) })?;
                let title: String = row.try_get("title")?;
                let id: i32 = row.try_get("id")?;
                Ok((
                    id,
                    PageRow {
                        id,
                        url,
                        mod_time: row.try_get("mod_time")?,
                        size: row.try_get::<i32, _>("size")? as i64,
                        title: if title.is_empty() { None } else { Some(title) },
                        plaintext: row.try_get("plaintext")?,
                        raw_title_html: None,
                    },
                ))
            })
            .collect::<Result<_, sqlx::Error>>()?;

        Ok(page_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Page ids in which at least one of `word_ids` occurs in either stream.
    pub async fn candidate_pages(&self, word_ids: &[i32]) -> Result<Vec<i32>, StoreError> {
        if word_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(i32,)> = sqlx::query_as(
            "SELECT DISTINCT page_id FROM page_word WHERE word_id = ANY($1) ORDER BY page_id",
        )
        .bind(word_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Keywords for `page_id`, combining both streams' frequencies, sorted
    /// by `(-combined_frequency, content_asc)`. A negative `limit` means
    /// "all keywords".
    pub async fn page_keywords(&self, page_id: i32, limit: i64) -> Result<Vec<(String, i64)>, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT
                word.content,
                (COALESCE(wp.frequency, 0) + COALESCE(wpt.frequency, 0))::bigint AS combined_frequency
            FROM page_word
            JOIN word ON word.id = page_word.word_id
            LEFT JOIN word_positions wp ON wp.page_word_id = page_word.id
            LEFT JOIN word_positions_title wpt ON wpt.page_word_id = page_word.id
            WHERE page_word.page_id = $1
            ORDER BY combined_frequency DESC, word.content ASC
            LIMIT $2
            "#,
        )
        .bind(page_id)
        .bind(none_if_negative(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Convert the CLI convention "negative means unbounded" into a `LIMIT`
/// bind parameter: Postgres treats `LIMIT NULL` as no limit at all.
fn none_if_negative(limit: i64) -> Option<i64> {
    if limit < 0 { None } else { Some(limit) }
}

fn positions_table(stream: Stream) -> &'static str {
    match stream {
        Stream::Plaintext => "word_positions",
        Stream::Title => "word_positions_title",
    }
}

async fn upsert_url(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, content: &str) -> Result<i32, StoreError> {
    if content.len() > 2047 {
        return Err(StoreError::Validation("url content exceeds 2047 characters".into()));
    }
    sqlx::query("INSERT INTO url (content) VALUES ($1) ON CONFLICT (content) DO NOTHING")
        .bind(content)
        .execute(&mut **tx)
        .await?;
    let id: i32 = sqlx::query_scalar("SELECT id FROM url WHERE content = $1")
        .bind(content)
        .fetch_one(&mut **tx)
        .await?;
    Ok(id)
}

async fn insert_positions(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    table: &str,
    page_word_id: i32,
    occ: &WordOccurrence,
) -> Result<(), StoreError> {
    let positions_str = positions_to_string(&occ.positions);
    if positions_str.is_empty() {
        return Err(StoreError::Validation("positions string must not be empty".into()));
    }
    let query = format!(
        "INSERT INTO {table} (page_word_id, positions, frequency, tf_normalized) VALUES ($1, $2, $3, $4)"
    );
    sqlx::query(&query)
        .bind(page_word_id)
        .bind(&positions_str)
        .bind(occ.frequency as i32)
        .bind(occ.tf_normalized)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[allow(dead_code)]
fn restore_positions(s: &str) -> Vec<u32> {
    positions_from_string(s)
}
