// src/config/validate.rs

use crate::config::model::{RawSettings, Settings};
use crate::errors::{BuildTermError, Result};

impl TryFrom<RawSettings> for Settings {
    type Error = crate::errors::BuildTermError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        validate_settings(&raw)?;
        Ok(Settings::new_unchecked(raw))
    }
}

/// Check a raw settings file for values that cannot work at launch time.
pub fn validate_settings(raw: &RawSettings) -> Result<()> {
    validate_tee_paths(raw)?;
    validate_terminal(raw)?;
    validate_geometry(raw)?;
    Ok(())
}

fn validate_tee_paths(raw: &RawSettings) -> Result<()> {
    let paths = [
        ("windows", &raw.tee_path.windows),
        ("osx", &raw.tee_path.osx),
        ("linux", &raw.tee_path.linux),
    ];
    for (platform, path) in paths {
        if path.trim().is_empty() {
            return Err(BuildTermError::ConfigError(format!(
                "tee_path.{platform} must not be empty"
            )));
        }
    }
    Ok(())
}

fn validate_terminal(raw: &RawSettings) -> Result<()> {
    if raw.terminal.trim().is_empty() {
        return Err(BuildTermError::ConfigError(
            "terminal must name a terminal emulator program".to_string(),
        ));
    }
    Ok(())
}

fn validate_geometry(raw: &RawSettings) -> Result<()> {
    if let Some(g) = raw.terminal_geometry {
        if g.columns == 0 || g.lines == 0 {
            return Err(BuildTermError::ConfigError(format!(
                "terminal_geometry must be at least 1x1 (got {}x{})",
                g.columns, g.lines
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TerminalGeometry;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_settings(&RawSettings::default()).is_ok());
    }

    #[test]
    fn zero_geometry_is_rejected() {
        let raw = RawSettings {
            terminal_geometry: Some(TerminalGeometry { columns: 80, lines: 0 }),
            ..RawSettings::default()
        };
        match Settings::try_from(raw) {
            Err(BuildTermError::ConfigError(msg)) => assert!(msg.contains("80x0")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn empty_tee_path_is_rejected() {
        let mut raw = RawSettings::default();
        raw.tee_path.osx = "  ".to_string();
        let err = validate_settings(&raw).unwrap_err();
        assert!(err.to_string().contains("tee_path.osx"));
    }
}
