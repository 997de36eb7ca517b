use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Top-level server configuration, loaded from rostrum.toml.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub push: PushSection,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub web_address: String,
    /// Public origin the frontend is served from; used for CORS.
    pub public_url: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            web_address: "0.0.0.0:8080".into(),
            public_url: "http://localhost:8080".into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite:rostrum.db?mode=rwc".into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct PushSection {
    /// Path to the application-server ES256 private key (PEM). If unset,
    /// an ephemeral key pair is generated at startup, which invalidates
    /// stored subscriptions across restarts.
    pub vapid_private_key_file: Option<String>,
    /// Contact identity sent to push services in the VAPID `sub` claim.
    pub contact: String,
    /// TTL header for submitted push messages, in seconds.
    pub ttl_seconds: u32,
}

impl Default for PushSection {
    fn default() -> Self {
        Self {
            vapid_private_key_file: None,
            contact: "mailto:admin@localhost".into(),
            ttl_seconds: 86400,
        }
    }
}

impl ServerConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> Self {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .unwrap_or_else(|e| panic!("failed to read config file {}: {}", path, e));
            toml::from_str(&contents)
                .unwrap_or_else(|e| panic!("failed to parse config file {}: {}", path, e))
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WEB_ADDRESS") {
            self.server.web_address = v;
        }
        if let Ok(v) = std::env::var("PUBLIC_URL") {
            self.server.public_url = v;
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = std::env::var("VAPID_PRIVATE_KEY_FILE") {
            self.push.vapid_private_key_file = Some(v);
        }
        if let Ok(v) = std::env::var("PUSH_CONTACT") {
            self.push.contact = v;
        }
        if let Ok(v) = std::env::var("PUSH_TTL_SECONDS")
            && let Ok(ttl) = v.parse()
        {
            self.push.ttl_seconds = ttl;
        }
    }
}
