pub mod cli;
pub mod config;
pub mod parser;
pub mod pipeline;
pub mod sink;
pub mod source;
