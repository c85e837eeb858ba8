use flexi_logger::{Duplicate, FileSpec, Logger, WriteMode};
use scraper::{ElementRef, Html, Selector};
use std::fmt::Write as _;

/// Run database migrations against a connection pool.
///
/// # Panics
/// This function panics if running the migrations throws an error.
pub async fn migrate(pool: &sqlx::PgPool) {
    sqlx::migrate!("../migrations")
        .run(pool)
        .await
        .expect("Database migrations should not throw an error.");
}

/// Open a connection pool to the database at `database_url`.
///
/// # Panics
/// This function panics if the connection cannot be established.
pub async fn init_pool(database_url: &str) -> sqlx::PgPool {
    sqlx::PgPool::connect(database_url)
        .await
        .expect("Connecting to the database should not throw an error.")
}

/// Initialize `flexi_logger` for a binary.
///
/// Mirrors every binary in this workspace: duplicate info-and-above output to
/// stdout, and additionally write to a `logs/` directory when `log_dir` is
/// given.
///
/// # Panics
/// This function panics if the logger fails to start.
pub fn init_logging(log_dir: Option<std::path::PathBuf>) -> flexi_logger::LoggerHandle {
    let logger = Logger::try_with_str("info").expect("Log level string should be valid.");

    let logger = if let Some(log_dir) = log_dir {
        logger.log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .suppress_basename()
                .suffix("log"),
        )
    } else {
        logger
    };

    logger
        .duplicate_to_stdout(Duplicate::Info)
        .write_mode(WriteMode::BufferAndFlush)
        .start()
        .expect("Starting the logger should not throw an error.")
}

/// Extracts human-readable text from parsed HTML.
///
/// Implemented for [`Html`] so that both the crawler (content extraction) and
/// the indexer (plaintext generation) share one notion of "the text of a
/// page".
pub trait ExtractText {
    /// Extract every text node's content, joined by whitespace.
    fn extract_text(&self) -> String;

    /// Extract text the same way as [`ExtractText::extract_text`], but insert
    /// a newline at block-element boundaries and skip the contents of
    /// `<title>` entirely. Used to build a page's plaintext stream.
    fn extract_plaintext(&self) -> String;
}

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "details", "dialog", "dd", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hgroup", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table",
    "ul",
];

impl ExtractText for Html {
    fn extract_text(&self) -> String {
        self.root_element().text().collect::<Vec<_>>().join(" ")
    }

    fn extract_plaintext(&self) -> String {
        let title_selector =
            Selector::parse("title").expect("Parsing `title` selector should not throw an error.");
        let title_ids: std::collections::HashSet<_> = self
            .select(&title_selector)
            .flat_map(|el| el.descendants())
            .map(|node| node.id())
            .collect();

        let mut out = String::new();
        for node in self.root_element().descendants() {
            if title_ids.contains(&node.id()) {
                continue;
            }
            if let Some(element) = ElementRef::wrap(node) {
                if BLOCK_TAGS.contains(&element.value().name()) && !out.is_empty() && !out.ends_with('\n')
                {
                    out.push('\n');
                }
                continue;
            }
            if let Some(text) = node.value().as_text() {
                let _ = write!(out, "{}", text.as_ref());
            }
        }
        out
    }
}
