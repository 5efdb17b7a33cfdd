pub mod grammar;
pub mod record;
pub mod timestamp;

pub use grammar::{AccessLogParser, ParseError};
pub use record::Record;
pub use timestamp::{TimestampError, TimestampResolver};
