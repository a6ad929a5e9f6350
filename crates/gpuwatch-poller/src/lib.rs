pub mod aggregator;
pub mod config;
pub mod error;
pub mod normalize;
pub mod payload;
pub mod scrape;

pub use aggregator::{poll, StatusAggregator};
pub use config::PollConfig;
pub use error::PollError;
pub use normalize::{bytes_to_gb, device_label, extract_current_task, normalize};
