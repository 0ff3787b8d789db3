use std::path::Path;

use super::{AppConfig, ConfigError};

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_missing_config() {
        let result = load_config("/nonexistent/config.yaml");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(&dir, "invalid.yaml", "invalid: yaml: content: [");

        let result = load_config(&path);
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_valid() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "config.yaml",
            r#"
server:
  port: 8066
  host: "0.0.0.0"
  public_url: "http://ha.local:8066"

upstream:
  timeout_seconds: 45
  pool_max_idle_per_host: 4

synthesis:
  config:
    url: "http://tts.local:8080/v1/tts"
    voice: "cyn2"
  options:
    temperature: 0.7
    repetition_penalty: "1.3"
    streaming: true
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 8066);
        assert_eq!(config.server.public_base_url(), "http://ha.local:8066");
        assert_eq!(config.upstream.timeout_seconds, 45);
        assert_eq!(config.upstream.pool_max_idle_per_host, 4);
        assert_eq!(
            config.synthesis.config.get("url").and_then(|v| v.as_str()),
            Some("http://tts.local:8080/v1/tts")
        );
        assert_eq!(
            config.synthesis.options.get("temperature").and_then(|v| v.as_f64()),
            Some(0.7)
        );
        assert_eq!(
            config.synthesis.options.get("streaming").and_then(|v| v.as_bool()),
            Some(true)
        );
    }

    #[test]
    fn test_load_config_minimal() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "minimal.yaml",
            r#"
server:
  port: 8066
  host: "127.0.0.1"
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.upstream.timeout_seconds, 60);
        assert!(config.synthesis.config.is_empty());
        assert!(config.synthesis.options.is_empty());
        assert!(config.server.public_url.is_none());
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "zero_timeout.yaml",
            r#"
server:
  port: 8066
  host: "127.0.0.1"
upstream:
  timeout_seconds: 0
"#,
        );

        let result = load_config(&path);
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_config_from_file() {
        let result = AppConfig::from_file("/nonexistent/path.yaml");
        assert!(result.is_err());
    }
}
