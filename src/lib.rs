//! Moving average of translation delivery times over a sliding window of
//! minutes, with the full history of the average as the window moves.

pub mod bucket;
pub mod cli;
pub mod event;
pub mod report;
pub mod timestamp;
pub mod window;

pub use bucket::MinuteBucket;
pub use event::DeliveryEvent;
pub use window::{AggregateError, HistoryRecord, SlidingWindowAggregator};
