use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use crate::parser::TimestampResolver;
use crate::sink::SinkDescriptor;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string)
}

/// Parse and validate a config from YAML text, expanding `$env{VAR}` references first.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    // Expand environment variables before parsing
    let yaml_string = expand_env_vars(yaml);

    // Check for unexpanded environment variables
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;

    // Expand tilde in the source path
    config.source.path = expand_tilde(&config.source.path);

    // Validate the config
    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    // Any $env{VAR} still present after expansion names an unset variable
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}",
        unexpanded_vars.join(", ")
    )))
}

/// Check every setting, collecting all problems into one error.
pub(crate) fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Source
    if config.source.path.as_os_str().is_empty() {
        errors.push("source.path cannot be empty".to_string());
    }
    if config.source.poll_interval.is_zero() {
        errors.push("source.poll_interval must be greater than zero".to_string());
    }

    // Zone name and offset handling
    if let Err(e) = TimestampResolver::from_config(&config.timestamp) {
        errors.push(format!("timestamp: {}", e));
    }

    validate_pipeline(&config.pipeline, &mut errors);
    validate_sink(&config.sink, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_pipeline(pipeline: &PipelineConfig, errors: &mut Vec<String>) {
    if pipeline.raw_queue_capacity == 0 {
        errors.push("pipeline.raw_queue_capacity must be at least 1".to_string());
    }
    if pipeline.record_queue_capacity == 0 {
        errors.push("pipeline.record_queue_capacity must be at least 1".to_string());
    }
    if pipeline.parser_workers == 0 {
        errors.push("pipeline.parser_workers must be at least 1".to_string());
    }
    if pipeline.writer_workers == 0 {
        errors.push("pipeline.writer_workers must be at least 1".to_string());
    }
}

fn validate_sink(sink: &SinkConfig, errors: &mut Vec<String>) {
    if let Err(e) = SinkDescriptor::parse(&sink.dsn) {
        errors.push(format!("sink.dsn: {}", e));
    }
    if sink.measurement.is_empty() {
        errors.push("sink.measurement cannot be empty".to_string());
    }
    if sink.batch_size == 0 {
        errors.push("sink.batch_size must be at least 1".to_string());
    }
    if sink.flush_interval.is_zero() {
        errors.push("sink.flush_interval must be greater than zero".to_string());
    }

    // Retry bounds
    let failure = &sink.on_write_failure;
    if failure.max_attempts == 0 {
        errors.push("sink.on_write_failure.max_attempts must be at least 1".to_string());
    }
    if failure.initial_backoff > failure.max_backoff {
        errors.push(
            "sink.on_write_failure.initial_backoff cannot exceed max_backoff".to_string(),
        );
    }
}
