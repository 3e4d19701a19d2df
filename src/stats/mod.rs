//! Request and exchange logging

mod request_log;
mod summary;

pub use request_log::format_request_log;
pub use summary::{format_summary, ExchangeSummary, ExchangeTimer};
