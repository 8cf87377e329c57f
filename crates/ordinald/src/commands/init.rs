use std::path::Path;

use anyhow::bail;

use ordinal_core::OrdinalConfig;

/// Write a fully spelled-out ordinal.toml to `output`.
pub fn init(output: &Path, store: &Path) -> anyhow::Result<()> {
    if output.exists() {
        bail!("{} already exists", output.display());
    }
    let config = OrdinalConfig::scaffold(store);
    std::fs::write(output, config.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("ordinal.toml");
        let store = dir.path().join("state.redb");

        init(&output, &store).unwrap();

        let config = OrdinalConfig::from_file(&output).unwrap();
        assert_eq!(config.store_path(), store);
        assert_eq!(config.retry_attempts().unwrap(), 6);
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("ordinal.toml");
        std::fs::write(&output, "").unwrap();

        assert!(init(&output, Path::new("/tmp/state.redb")).is_err());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "");
    }
}
