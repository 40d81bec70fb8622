use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::guard::config::{EXAMPLE_CONFIG, get_config_path, resolve_config};

/// Write the example configuration file
pub fn init(output: Option<PathBuf>, force: bool) -> Result<()> {
    let output_path = match output {
        Some(path) => path,
        None => get_config_path()?,
    };

    write_example(&output_path, force)?;

    println!("✓ Created configuration file: {}", output_path.display());
    println!("\nEdit this file to set time servers and lock windows.");
    println!("Then start the guard: clock-guard run --config {}", output_path.display());

    Ok(())
}

fn write_example(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}\nUse --force to overwrite",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

/// Print the effective configuration as YAML
pub fn show(config_path: Option<&Path>) -> Result<()> {
    let (config, source) = resolve_config(config_path)?;

    match source {
        Some(path) => println!("# Loaded from: {}", path.display()),
        None => println!("# Built-in defaults (no configuration file found)"),
    }

    let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
    print!("{}", yaml);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::config::load_config;

    #[test]
    fn test_write_example_creates_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clock-guard.yaml");

        write_example(&path, false).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.lock_windows.len(), 4);
    }

    #[test]
    fn test_write_example_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock-guard.yaml");
        std::fs::write(&path, "drift:\n  threshold_minutes: 1\n").unwrap();

        assert!(write_example(&path, false).is_err());
        assert!(std::fs::read_to_string(&path).unwrap().contains("threshold_minutes: 1"));

        write_example(&path, true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);
    }
}
