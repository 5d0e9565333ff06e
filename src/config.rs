use std::{env, path::PathBuf};

use anyhow::{Context, Result, bail};

use crate::upload::UploadConstraints;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPLOAD_DIR: &str = "storage/uploads";

/// Runtime configuration for the upload server, read from the environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub constraints: UploadConstraints,
    /// Prefix prepended to `/uploads/...` in returned URLs. Empty means relative URLs.
    pub public_base_url: String,
    /// Shared admin credential. When unset the placeholder token rule applies.
    pub admin_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got `{raw}`"))?,
            None => DEFAULT_PORT,
        };

        let upload_dir = lookup("UPLOAD_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));

        let mut constraints = UploadConstraints::default();
        if let Some(raw) = lookup("UPLOAD_MAX_BYTES") {
            let max_bytes: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("UPLOAD_MAX_BYTES must be an integer, got `{raw}`"))?;
            if max_bytes == 0 {
                bail!("UPLOAD_MAX_BYTES must be greater than 0");
            }
            constraints.max_bytes = max_bytes;
        }
        if let Some(raw) = lookup("UPLOAD_ALLOWED_TYPES") {
            let types = parse_type_list(&raw)?;
            if !types.is_empty() {
                constraints.allowed_types = types;
            }
        }

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or_default();

        let admin_token = lookup("ADMIN_API_TOKEN")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        Ok(Self {
            port,
            upload_dir,
            constraints,
            public_base_url,
            admin_token,
        })
    }

    pub fn public_url(&self, stored_name: &str) -> String {
        format!("{}/uploads/{}", self.public_base_url, stored_name)
    }
}

fn parse_type_list(raw: &str) -> Result<Vec<mime::Mime>> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<mime::Mime>()
                .with_context(|| format!("invalid MIME type in UPLOAD_ALLOWED_TYPES: `{item}`"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup_from(&[])).expect("config");
        assert_eq!(config.port, 8080);
        assert_eq!(config.upload_dir, PathBuf::from("storage/uploads"));
        assert_eq!(config.constraints.max_bytes, 5 * 1024 * 1024);
        assert!(config.admin_token.is_none());
        assert_eq!(config.public_url("a.png"), "/uploads/a.png");
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("UPLOAD_DIR", "/tmp/media"),
            ("UPLOAD_MAX_BYTES", "1024"),
            ("UPLOAD_ALLOWED_TYPES", "image/png, image/svg+xml"),
            ("PUBLIC_BASE_URL", "https://cdn.example.com/"),
            ("ADMIN_API_TOKEN", "  secret-token  "),
        ]))
        .expect("config");

        assert_eq!(config.port, 9000);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/media"));
        assert_eq!(config.constraints.max_bytes, 1024);
        let types: Vec<&str> = config
            .constraints
            .allowed_types
            .iter()
            .map(|m| m.essence_str())
            .collect();
        assert_eq!(types, vec!["image/png", "image/svg+xml"]);
        assert_eq!(config.admin_token.as_deref(), Some("secret-token"));
        assert_eq!(
            config.public_url("a.png"),
            "https://cdn.example.com/uploads/a.png"
        );
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("UPLOAD_MAX_BYTES", "0")])).is_err());
        assert!(
            AppConfig::from_lookup(lookup_from(&[("UPLOAD_ALLOWED_TYPES", "not a mime")]))
                .is_err()
        );
    }
}
