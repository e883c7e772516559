//! Service configuration

use crate::server::OriginPolicy;
use std::fmt;
use thiserror::Error;

pub const APP_ID_VAR: &str = "APP_ID";
pub const APP_CERTIFICATE_VAR: &str = "APP_CERTIFICATE";
pub const SERVER_PORT_VAR: &str = "SERVER_PORT";
pub const PORT_VAR: &str = "PORT";
pub const CORS_ALLOW_ORIGIN_VAR: &str = "CORS_ALLOW_ORIGIN";

/// Port used when neither `SERVER_PORT` nor `PORT` is set
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set; check the environment or .env file")]
    Missing(&'static str),

    #[error("invalid port in {var}: '{value}'")]
    InvalidPort { var: &'static str, value: String },
}

/// Immutable configuration, built once at startup and shared by reference
#[derive(Clone)]
pub struct ServiceConfig {
    app_id: String,
    app_certificate: String,
    listen_port: u16,
    allowed_origins: OriginPolicy,
}

impl ServiceConfig {
    /// Create a configuration with default port and unrestricted origins.
    /// Both credentials must be non-empty.
    pub fn new(
        app_id: impl Into<String>,
        app_certificate: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let app_id = app_id.into();
        let app_certificate = app_certificate.into();

        if app_id.is_empty() {
            return Err(ConfigError::Missing(APP_ID_VAR));
        }
        if app_certificate.is_empty() {
            return Err(ConfigError::Missing(APP_CERTIFICATE_VAR));
        }

        Ok(Self {
            app_id,
            app_certificate,
            listen_port: DEFAULT_PORT,
            allowed_origins: OriginPolicy::default(),
        })
    }

    /// Load from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    ///
    /// `SERVER_PORT` takes precedence over `PORT`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let app_id = get(APP_ID_VAR).ok_or(ConfigError::Missing(APP_ID_VAR))?;
        let app_certificate =
            get(APP_CERTIFICATE_VAR).ok_or(ConfigError::Missing(APP_CERTIFICATE_VAR))?;

        let mut config = Self::new(app_id, app_certificate)?;

        let port = get(SERVER_PORT_VAR)
            .map(|v| (SERVER_PORT_VAR, v))
            .or_else(|| get(PORT_VAR).map(|v| (PORT_VAR, v)));
        if let Some((var, value)) = port {
            config.listen_port = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort { var, value })?;
        }

        if let Some(origins) = lookup(CORS_ALLOW_ORIGIN_VAR) {
            config.allowed_origins = OriginPolicy::parse(&origins);
        }

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    pub fn with_allowed_origins(mut self, policy: OriginPolicy) -> Self {
        self.allowed_origins = policy;
        self
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn app_certificate(&self) -> &str {
        &self.app_certificate
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    pub fn allowed_origins(&self) -> &OriginPolicy {
        &self.allowed_origins
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("app_id", &self.app_id)
            .field("app_certificate", &"[REDACTED]")
            .field("listen_port", &self.listen_port)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            ServiceConfig::from_lookup(lookup(&[("APP_ID", "id"), ("APP_CERTIFICATE", "cert")]))
                .unwrap();
        assert_eq!(config.app_id(), "id");
        assert_eq!(config.listen_port(), DEFAULT_PORT);
        assert_eq!(config.allowed_origins(), &OriginPolicy::Unrestricted);
    }

    #[test]
    fn test_missing_credentials() {
        let result = ServiceConfig::from_lookup(lookup(&[("APP_CERTIFICATE", "cert")]));
        assert!(matches!(result, Err(ConfigError::Missing("APP_ID"))));

        let result =
            ServiceConfig::from_lookup(lookup(&[("APP_ID", "id"), ("APP_CERTIFICATE", "")]));
        assert!(matches!(result, Err(ConfigError::Missing("APP_CERTIFICATE"))));
    }

    #[test]
    fn test_port_precedence() {
        let base = [("APP_ID", "id"), ("APP_CERTIFICATE", "cert")];

        let mut vars = base.to_vec();
        vars.push(("PORT", "9000"));
        let config = ServiceConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.listen_port(), 9000);

        vars.push(("SERVER_PORT", "9100"));
        let config = ServiceConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.listen_port(), 9100);
    }

    #[test]
    fn test_invalid_port() {
        let result = ServiceConfig::from_lookup(lookup(&[
            ("APP_ID", "id"),
            ("APP_CERTIFICATE", "cert"),
            ("SERVER_PORT", "eighty"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidPort { var: "SERVER_PORT", .. })
        ));
    }

    #[test]
    fn test_origins_and_redaction() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("APP_ID", "id"),
            ("APP_CERTIFICATE", "super-secret"),
            ("CORS_ALLOW_ORIGIN", "https://a.example,https://b.example"),
        ]))
        .unwrap();

        assert!(config.allowed_origins().permits("https://b.example"));
        assert!(!format!("{:?}", config).contains("super-secret"));
    }
}
