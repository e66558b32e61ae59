use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub links: LinksConfig,
    pub search: SearchConfig,
    pub dispatch: DispatchConfig,
}

/// The account we follow from, and where follow calls go.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub user: String,
    pub follow_url: String,
}

/// The bookmarking account whose tagged links are tracked.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Defaults to the service user when empty.
    #[serde(default)]
    pub user: String,
    pub tags: Vec<String>,
    pub base_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Fine-grained dispatch trigger period; one follow attempt per
    /// tick keeps the outbound rate bounded by this alone.
    pub period_minutes: u32,
    /// Coarse discovery trigger period, installed by `automate`.
    pub discover_every_hours: u32,
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            service: ServiceConfig {
                user: String::new(),
                follow_url: "http://social.example/friendships/create/{actor}.json?follow=true"
                    .to_string(),
            },
            links: LinksConfig {
                user: String::new(),
                tags: vec!["follow".to_string()],
                base_url: "http://feeds.bookmarks.example".to_string(),
            },
            search: SearchConfig {
                base_url: "http://mentions.example".to_string(),
                api_key: String::new(),
            },
            dispatch: DispatchConfig {
                period_minutes: 1,
                discover_every_hours: 6,
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let s = toml::to_string_pretty(self).context("serialize config")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// The bookmark account, falling back to the service user.
    pub fn links_user(&self) -> &str {
        if self.links.user.is_empty() {
            &self.service.user
        } else {
            &self.links.user
        }
    }

    pub fn default_state_root() -> PathBuf {
        PathBuf::from(shellexpand::tilde("~/.linkfollow").to_string())
    }

    pub fn config_path(state_root: &Path) -> PathBuf {
        state_root.join("linkfollow.toml")
    }

    pub fn checkpoint_path(state_root: &Path) -> PathBuf {
        state_root.join("checkpoint.json")
    }

    pub fn queue_path(state_root: &Path) -> PathBuf {
        state_root.join("queue")
    }
}
