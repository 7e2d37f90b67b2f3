use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    contracts::Network,
    identity::{MspRoles, DEFAULT_PARTICIPANT_MSP, DEFAULT_REGISTRAR_MSP},
    ledger::{keys::DEFAULT_NAMESPACE, KeyScheme},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("config field {0} must not be empty")]
    Empty(&'static str),
    #[error("registrar and participant MSP ids must differ (both {0})")]
    SharedMsp(String),
}

/// Network-wide settings, read from a JSON file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct NetworkConfig {
    pub namespace: String,
    pub registrar_msp: String,
    pub participant_msp: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            registrar_msp: DEFAULT_REGISTRAR_MSP.to_string(),
            participant_msp: DEFAULT_PARTICIPANT_MSP.to_string(),
        }
    }
}

impl NetworkConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let bytes = fs::read(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::Empty("namespace"));
        }
        if self.registrar_msp.is_empty() {
            return Err(ConfigError::Empty("registrar_msp"));
        }
        if self.participant_msp.is_empty() {
            return Err(ConfigError::Empty("participant_msp"));
        }
        if self.registrar_msp == self.participant_msp {
            return Err(ConfigError::SharedMsp(self.registrar_msp.clone()));
        }
        Ok(())
    }

    pub fn network(&self) -> Network {
        Network::new(
            KeyScheme::new(self.namespace.clone()),
            MspRoles {
                registrar_msp: self.registrar_msp.clone(),
                participant_msp: self.participant_msp.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");
        fs::write(&path, br#"{"registrar_msp":"landOfficeMSP"}"#).unwrap();
        let config = NetworkConfig::load(&path).unwrap();
        assert_eq!(config.registrar_msp, "landOfficeMSP");
        assert_eq!(config.participant_msp, DEFAULT_PARTICIPANT_MSP);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);

        let network = config.network();
        assert_eq!(network.roles.role_of("landOfficeMSP"), Role::Registrar);
        assert_eq!(network.keys.namespace(), DEFAULT_NAMESPACE);
    }

    #[test]
    fn shared_msp_is_rejected() {
        let config = NetworkConfig {
            participant_msp: DEFAULT_REGISTRAR_MSP.into(),
            ..NetworkConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::SharedMsp(_))));
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = NetworkConfig::load(Path::new("/nonexistent/regnet.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/regnet.json"));
    }
}
