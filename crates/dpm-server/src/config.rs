//! Server configuration.

use anyhow::Result;
use dpm_auth::AuthConfig;
use dpm_core::models::topic::TopicKind;
use dpm_db::DbConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DbConfig,
    pub auth: AuthConfig,
    pub bootstrap: BootstrapConfig,
    pub events: EventSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// Broadcast channel capacity.
    pub capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Data seeded on start. Existing entities are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub admin_users: Vec<String>,
    pub non_admin_users: Vec<String>,
    pub groups: Vec<BootstrapGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub users: Vec<BootstrapMember>,
    #[serde(default)]
    pub topics: Vec<BootstrapTopic>,
    #[serde(default)]
    pub applications: Vec<BootstrapApplication>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapMember {
    pub email: String,
    #[serde(default)]
    pub group_admin: bool,
    #[serde(default)]
    pub topic_admin: bool,
    #[serde(default)]
    pub application_admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapTopic {
    pub name: String,
    pub kind: TopicKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapApplication {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
}

impl Settings {
    /// Defaults, then `config/default`, then `DPM_*` environment
    /// variables (`DPM_DATABASE__URL`, `DPM_AUTH__JWT_ISSUER`, ...).
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .set_default("auth.jwt_issuer", "dpm")?
            .set_default("auth.grant_token_lifetime_secs", 172_800)?
            .set_default("events.capacity", 1024)?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("DPM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let settings = parse("");
        assert_eq!(settings.database.namespace, "dpm");
        assert_eq!(settings.auth.grant_token_lifetime_secs, 172_800);
        assert_eq!(settings.events.capacity, 1024);
        assert!(settings.bootstrap.groups.is_empty());
    }

    #[test]
    fn bootstrap_section_parses() {
        let settings = parse(
            r#"
            [database]
            endpoint = "mem://"

            [bootstrap]
            admin_users = ["root@example.com"]

            [[bootstrap.groups]]
            name = "Robotics"
            is_public = true

            [[bootstrap.groups.users]]
            email = "ops@example.com"
            topic_admin = true

            [[bootstrap.groups.topics]]
            name = "pose"
            kind = "B"

            [[bootstrap.groups.applications]]
            name = "planner"
            "#,
        );

        assert_eq!(settings.database.endpoint, "mem://");
        assert!(settings.database.credentials.is_none());
        assert_eq!(settings.database.namespace, "dpm");
        assert_eq!(settings.bootstrap.admin_users, vec!["root@example.com"]);

        let group = &settings.bootstrap.groups[0];
        assert!(group.is_public);
        assert!(group.users[0].topic_admin);
        assert!(!group.users[0].group_admin);
        assert_eq!(group.topics[0].kind, TopicKind::B);
        assert_eq!(group.applications[0].name, "planner");
    }
}
