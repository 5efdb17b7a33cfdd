use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Prefer ~/.config/logflow/config.yml, fall back to /etc/logflow/config.yml
    let config_path = dirs::home_dir()
        .map(|home| home.join(".config/logflow/config.yml"))
        .filter(|path| match path.parent() {
            Some(parent) => fs::create_dir_all(parent).is_ok(),
            None => false,
        })
        .unwrap_or_else(|| {
            eprintln!("Warning: could not create ~/.config/logflow, falling back to /etc/logflow/config.yml");
            PathBuf::from("/etc/logflow/config.yml")
        });

    if config_path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());

    match crate::config::load_config(&path) {
        Ok(config) => {
            println!("✓ Config is valid");
            println!(
                "  source: {} ({} parser workers, {} writer workers)",
                config.source.path.display(),
                config.pipeline.parser_workers,
                config.pipeline.writer_workers
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Config validation failed:\n{}", e);
            std::process::exit(1);
        }
    }
}
