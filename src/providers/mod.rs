pub mod rss;
pub mod rss_provider;

pub use rss::{FeedError, RssFeed};
pub use rss_provider::RssProvider;
