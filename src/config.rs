//! Configuration Management
//!
//! Two sources: the user configuration file (persistent defaults) and the
//! profile sidecar file listing the AWS profiles an inventory iterates over.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default name of the profile sidecar file
pub const PROFILES_FILE: &str = "aws_profiles.json";

/// User configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Directory reports are written to
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Region passed to every CLI call
    #[serde(default)]
    pub region: Option<String>,
    /// Keep TLS verification on (the CLI is called with --no-verify-ssl otherwise)
    #[serde(default)]
    pub verify_ssl: bool,
    /// Path or name of the AWS CLI binary
    #[serde(default)]
    pub aws_binary: Option<String>,
    /// Profiles used when no sidecar file is found
    #[serde(default)]
    pub default_profiles: Vec<String>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("aws-inventory").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Get effective region (CLI > config > AWS environment)
    pub fn effective_region(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.region.clone())
            .or_else(|| std::env::var("AWS_REGION").ok())
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .filter(|r| !r.is_empty())
    }

    /// Get effective AWS CLI binary (CLI > config > "aws")
    pub fn effective_binary(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.aws_binary.clone())
            .unwrap_or_else(|| "aws".to_string())
    }

    /// Get effective output directory (CLI > config > current directory)
    pub fn effective_output_dir(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.output_dir.clone())
            .unwrap_or_default()
    }
}

/// Accepted shapes of the profile sidecar file
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProfilesFile {
    List(Vec<String>),
    Object { profiles: Vec<String> },
}

/// Read profiles from a JSON or YAML sidecar file
pub fn read_profiles_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    let parsed: ProfilesFile = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    };

    let profiles = match parsed {
        ProfilesFile::List(p) | ProfilesFile::Object { profiles: p } => p,
    };

    Ok(profiles
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect())
}

/// Decide which profiles to iterate (CLI > sidecar file > user config > built-in)
pub fn resolve_profiles(
    cli: &[String],
    profiles_file: &Path,
    config: &Config,
    builtin: &[&str],
) -> Vec<String> {
    if !cli.is_empty() {
        return cli.to_vec();
    }

    match read_profiles_file(profiles_file) {
        Ok(profiles) if !profiles.is_empty() => {
            tracing::info!("Loaded {} profiles from {}", profiles.len(), profiles_file.display());
            return profiles;
        }
        Ok(_) => {
            tracing::warn!("{} lists no profiles, using defaults", profiles_file.display());
        }
        Err(e) if !profiles_file.exists() => {
            tracing::warn!("{} not found, using default profiles", profiles_file.display());
            tracing::debug!("{:#}", e);
        }
        Err(e) => {
            tracing::warn!("{:#}. Using default profiles", e);
        }
    }

    if !config.default_profiles.is_empty() {
        return config.default_profiles.clone();
    }

    builtin.iter().map(|p| p.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_read_profiles_json_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "aws_profiles.json", r#"["int", " shared ", ""]"#);
        assert_eq!(read_profiles_file(&path).unwrap(), vec!["int", "shared"]);
    }

    #[test]
    fn test_read_profiles_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "aws_profiles.json",
            r#"{"profiles": ["account1-profile", "prod-account"]}"#,
        );
        assert_eq!(
            read_profiles_file(&path).unwrap(),
            vec!["account1-profile", "prod-account"]
        );
    }

    #[test]
    fn test_read_profiles_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "profiles.yaml", "profiles:\n  - dnaDev\n  - dnaProd\n");
        assert_eq!(read_profiles_file(&path).unwrap(), vec!["dnaDev", "dnaProd"]);
    }

    #[test]
    fn test_resolve_prefers_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "aws_profiles.json", r#"["int"]"#);
        let cli = vec!["audit".to_string()];
        assert_eq!(
            resolve_profiles(&cli, &path, &Config::default(), &["shared"]),
            vec!["audit"]
        );
    }

    #[test]
    fn test_resolve_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert_eq!(
            resolve_profiles(&[], &path, &Config::default(), &["shared"]),
            vec!["shared"]
        );

        let config = Config {
            default_profiles: vec!["master".to_string()],
            ..Default::default()
        };
        assert_eq!(resolve_profiles(&[], &path, &config, &["shared"]), vec!["master"]);
    }

    #[test]
    fn test_resolve_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "aws_profiles.json", "{not json");
        assert_eq!(
            resolve_profiles(&[], &path, &Config::default(), &["default"]),
            vec!["default"]
        );
    }

    #[test]
    fn test_effective_values() {
        let config = Config {
            output_dir: Some(PathBuf::from("reports")),
            aws_binary: Some("/usr/local/bin/aws".to_string()),
            region: Some("ap-southeast-2".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_binary(None), "/usr/local/bin/aws");
        assert_eq!(config.effective_binary(Some("aws2")), "aws2");
        assert_eq!(config.effective_output_dir(None), PathBuf::from("reports"));
        assert_eq!(config.effective_region(Some("us-east-1")).as_deref(), Some("us-east-1"));
        assert_eq!(config.effective_region(None).as_deref(), Some("ap-southeast-2"));
        assert_eq!(Config::default().effective_binary(None), "aws");
    }
}
