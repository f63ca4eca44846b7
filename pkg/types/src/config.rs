use serde::{Deserialize, Serialize};

/// Controller configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// data-dir: /var/lib/netset/data
/// resync-secs: 30
/// requeue-delay-ms: 500
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfigFile {
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default, alias = "resync-secs")]
    pub resync_secs: Option<u64>,
    #[serde(default, alias = "requeue-delay-ms")]
    pub requeue_delay_ms: Option<u64>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
