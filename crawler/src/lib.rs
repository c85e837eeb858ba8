pub mod crawl;
pub mod error;
pub mod queue;
pub mod url_handler;

pub use crawl::{build_client, crawl, CrawlOutcome, ResponseMeta};
pub use queue::PageQueue;

// From https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#method.user_agent
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
