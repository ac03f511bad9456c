//! TOML configuration loader with validation.
//!
//! Every field has an on-robot default, so a missing file or an empty
//! table yields a runnable configuration; a present file only needs
//! to name the fields it overrides. Bound validation runs after
//! parsing and rejects the whole file on the first violation.

use std::path::Path;

use tracing::info;

use strider_common::config::CoreConfig;
use strider_common::error::ConfigError;

/// Load and validate the core configuration.
///
/// With no path, returns the validated defaults.
pub fn load_config(path: Option<&Path>) -> Result<CoreConfig, ConfigError> {
    let cfg = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
            let cfg: CoreConfig =
                toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
            info!(path = %path.display(), "configuration loaded");
            cfg
        }
        None => {
            info!("no configuration file given, using defaults");
            CoreConfig::default()
        }
    };

    cfg.validate().map_err(ConfigError::Validation)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use strider_common::config::ControllerKind;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.cycle_time_us, 1000);
        assert_eq!(cfg.controller, ControllerKind::Walker);
    }

    #[test]
    fn empty_file_equals_defaults() {
        let file = write_config("");
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.cycle_time_us, load_config(None).unwrap().cycle_time_us);
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let file = write_config(
            r#"
            controller = "pendular"
            telemetry_interval = 50

            [walker]
            leaning = 0.08
            "#,
        );
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.controller, ControllerKind::Pendular);
        assert_eq!(cfg.telemetry_interval, 50);
        assert_eq!(cfg.walker.leaning, 0.08);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.contact.set_count, 3);
    }

    #[test]
    fn out_of_bounds_value_is_rejected() {
        let file = write_config("cycle_time_us = 0\n");
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("cycle_time_us"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let file = write_config("controller = [broken\n");
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config(Some(Path::new("/nonexistent/strider.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
