use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{Error, Result, env_subst::substitute_env, schema::CommsConfig};

/// Config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["wisp.toml", "wisp.json"];

/// Load, substitute, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<CommsConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Parse config text; the format is chosen by the extension of `path`.
pub fn parse_config(raw: &str, path: &Path) -> Result<CommsConfig> {
    let config: CommsConfig = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(raw)?,
        Some("json") => serde_json::from_str(raw)?,
        _ => {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        },
    };
    config.validate()?;
    Ok(config)
}

/// Load the first config file found in `dir`.
///
/// Returns `CommsConfig::default()` when no file exists or the file is
/// unusable.
pub fn discover_and_load(dir: &Path) -> CommsConfig {
    let Some(path) = find_config_file(dir) else {
        debug!(dir = %dir.display(), "no config file found, using defaults");
        return CommsConfig::default();
    };
    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            CommsConfig::default()
        },
    }
}

fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("wisp.toml", "[indirect]\nwhiteboard_port = 6000\n")]
    #[case("wisp.json", r#"{"indirect": {"whiteboard_port": 6000}}"#)]
    fn partial_file_keeps_defaults(#[case] name: &str, #[case] body: &str) {
        let cfg = parse_config(body, Path::new(name)).expect("parse config");
        assert_eq!(cfg.indirect.whiteboard_port, 6000);
        assert_eq!(cfg.indirect.check_frequency_ms, 1000);
        assert_eq!(cfg.direct.start_port, 10_000);
    }

    #[test]
    fn unknown_extension_rejected() {
        let err = parse_config("", Path::new("wisp.ini")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn invalid_values_rejected() {
        let err = parse_config("[indirect]\nhashtag_prefix = \"\"\n", Path::new("c.toml"))
            .unwrap_err();
        assert!(matches!(err, Error::Invalid { .. }));
    }

    #[test]
    fn discover_reads_file_from_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("wisp.toml"),
            "[direct]\nstart_port = 20000\nbind_address = \"0.0.0.0\"\n",
        )
        .expect("write config");

        let cfg = discover_and_load(dir.path());
        assert_eq!(cfg.direct.start_port, 20_000);
        assert_eq!(cfg.direct.bind_address.as_deref(), Some("0.0.0.0"));
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(discover_and_load(dir.path()), CommsConfig::default());

        std::fs::write(dir.path().join("wisp.toml"), "direct = 3").expect("write config");
        assert_eq!(discover_and_load(dir.path()), CommsConfig::default());
    }
}
