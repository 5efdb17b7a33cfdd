pub mod tailer;

pub use tailer::{RawLine, Tailer, TailerError};
