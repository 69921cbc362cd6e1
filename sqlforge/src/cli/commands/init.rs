//! Init command

use crate::cli::app::InitArgs;
use anyhow::{Context, Result};
use sqlforge_core::EXAMPLE_CONFIG;
use std::path::Path;

/// Execute the init command
pub fn execute(args: InitArgs) -> Result<()> {
    write_example(&args.path, args.force)?;
    println!("Wrote {}", args.path.display());
    Ok(())
}

fn write_example(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlforge_core::Config;
    use tempfile::TempDir;

    #[test]
    fn test_written_file_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sqlforge.toml");

        write_example(&path, false).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.backend.provider, "vertex");
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sqlforge.toml");
        std::fs::write(&path, "# mine").unwrap();

        assert!(write_example(&path, false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine");

        write_example(&path, true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[backend]"));
    }
}
