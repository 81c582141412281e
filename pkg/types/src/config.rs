use serde::{Deserialize, Serialize};

/// Controller configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// data-dir: /var/lib/hpa-transfer/data
/// call-timeout-secs: 10
/// max-concurrent-reconciles: 4
/// base-backoff-ms: 500
/// max-backoff-secs: 60
/// log-json: false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfigFile {
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default, alias = "call-timeout-secs")]
    pub call_timeout_secs: Option<u64>,
    #[serde(default, alias = "max-concurrent-reconciles")]
    pub max_concurrent_reconciles: Option<usize>,
    #[serde(default, alias = "base-backoff-ms")]
    pub base_backoff_ms: Option<u64>,
    #[serde(default, alias = "max-backoff-secs")]
    pub max_backoff_secs: Option<u64>,
    #[serde(default, alias = "log-json")]
    pub log_json: Option<bool>,
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
