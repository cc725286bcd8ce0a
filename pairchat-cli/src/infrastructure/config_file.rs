use crate::infrastructure::error::{CliError, Result};
use pairchat_core::{EngineConfig, EventProfile};
use std::path::{Path, PathBuf};

/// Where an `EngineConfig` comes from, plus command line overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    pub path: Option<PathBuf>,
    pub profile: Option<EventProfile>,
    pub display_name: Option<String>,
    pub turn_server: Option<String>,
    pub turn_username: Option<String>,
    pub turn_credential: Option<String>,
}

impl ConfigSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn preset(profile: EventProfile) -> Self {
        Self {
            profile: Some(profile),
            ..Default::default()
        }
    }

    /// Read, override and validate
    pub fn load(&self) -> Result<EngineConfig> {
        let mut config = match &self.path {
            Some(path) => read_file(path)?,
            None => match self.profile.unwrap_or_default() {
                EventProfile::Voice => EngineConfig::voice(),
                EventProfile::Video => EngineConfig::video(),
            },
        };

        // A profile flag on top of a file only switches the event names
        if let (Some(_), Some(profile)) = (&self.path, self.profile) {
            config.profile = profile;
        }
        if let Some(name) = &self.display_name {
            config = config.with_display_name(name.clone());
        }

        if let Some(url) = &self.turn_server {
            match (&self.turn_username, &self.turn_credential) {
                (Some(username), Some(credential)) => {
                    config = config.with_turn_server(url.clone(), username.clone(), credential.clone());
                }
                _ => {
                    return Err(CliError::InvalidConfig(
                        "TURN server requires both username and credential".to_string(),
                    ));
                }
            }
        }

        config.validate()?;
        tracing::debug!("⚙️ Loaded {} config", config.profile);
        Ok(config)
    }
}

fn read_file(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.to_path_buf()));
    }
    let json = std::fs::read_to_string(path)?;
    Ok(EngineConfig::from_json_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_preset_defaults_to_voice() {
        let config = ConfigSource::default().load().unwrap();
        assert_eq!(config.profile, EventProfile::Voice);
    }

    #[test]
    fn test_file_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "retry": {{ "schedule_ms": [500], "max_attempts": 1 }} }}"#
        )
        .unwrap();

        let source = ConfigSource {
            profile: Some(EventProfile::Video),
            display_name: Some("Alice".to_string()),
            ..ConfigSource::from_path(file.path())
        };
        let config = source.load().unwrap();

        assert_eq!(config.profile, EventProfile::Video);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigSource::from_path("/definitely/not/here.json").load();
        assert!(matches!(result, Err(CliError::ConfigFileNotFound { .. })));
    }

    #[test]
    fn test_turn_without_credentials() {
        let source = ConfigSource {
            turn_server: Some("turn:turn.example.org:3478".to_string()),
            turn_username: Some("user".to_string()),
            ..Default::default()
        };
        assert!(matches!(source.load(), Err(CliError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "connect_timeout_ms": 0 }}"#).unwrap();
        let result = ConfigSource::from_path(file.path()).load();
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
