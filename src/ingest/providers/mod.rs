// src/ingest/providers/mod.rs
pub mod atom_feed;
pub mod quota_api;
pub mod scraper;

pub use atom_feed::AtomFeedAdapter;
pub use quota_api::QuotaApiAdapter;
pub use scraper::ScraperAdapter;
