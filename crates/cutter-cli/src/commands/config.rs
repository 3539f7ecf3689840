//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_info, print_success, print_warning};
use cutter_core::config::{self, ConfigFile};

fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Print the config file location
pub fn config_path(config_path: Option<&Path>) {
    println!("{}", resolve_path(config_path).display());
}

/// Get a config value by dotted key (e.g. `tunnel.ready_timeout`)
///
/// Keys missing from the file fall back to the built-in defaults.
pub fn config_get(config_path: Option<&Path>, key: &str) -> Result<()> {
    let config = ConfigFile::load_or_default(config_path).context("Failed to load configuration")?;
    let value = toml::Value::try_from(&config).context("Failed to encode configuration")?;

    let mut current = &value;
    for part in key.split('.') {
        current = current
            .as_table()
            .and_then(|t| t.get(part))
            .ok_or_else(|| anyhow::anyhow!("Key not found: {}", key))?;
    }

    match current {
        toml::Value::String(s) => println!("{}", s),
        toml::Value::Table(_) => println!("{}", toml::to_string_pretty(current)?),
        other => println!("{}", other),
    }

    Ok(())
}

/// Set a config value by dotted key
///
/// The result is validated against the config schema before it is written.
pub fn config_set(config_path: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let path = resolve_path(config_path);

    let mut table: toml::Table = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        toml::Table::new()
    };

    let parts: Vec<&str> = key.split('.').collect();
    let (last_key, parents) = parts
        .split_last()
        .filter(|(last, _)| !last.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid key: {}", key))?;

    let mut current = &mut table;
    for part in parents {
        current = current
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("Cannot navigate to key: {}", key))?;
    }

    let toml_value = if value == "true" {
        toml::Value::Boolean(true)
    } else if value == "false" {
        toml::Value::Boolean(false)
    } else if let Ok(i) = value.parse::<i64>() {
        toml::Value::Integer(i)
    } else {
        toml::Value::String(value.to_string())
    };
    current.insert(last_key.to_string(), toml_value);

    // Reject values the loader would refuse later
    let content = toml::to_string_pretty(&table)?;
    toml::from_str::<ConfigFile>(&content)
        .with_context(|| format!("Invalid value for {}: {}", key, value))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Show current configuration
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Using built-in defaults:");
        println!();
        println!("{}", toml::to_string_pretty(&ConfigFile::default())?);
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    println!("{}", content);

    Ok(())
}

/// Write the default configuration file
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = resolve_path(config_path);

    if path.exists() && !force {
        print_warning(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(&path, &ConfigFile::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}
