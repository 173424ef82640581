//! Job board crawler: a headless browser walks the search listing, and postings
//! and companies not seen before are stored.

pub mod browser;
pub mod error;
pub mod parse;
pub mod scheduler;
pub mod service;

pub use scheduler::{start_scheduler, CrawlGuard};
pub use service::CrawlSummary;
