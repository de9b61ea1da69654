// SPDX-License-Identifier: LGPL-3.0-only
use anyhow::Result;
use levelup_core::config::LoaderConfig;
use serde::Deserialize;
use smol::fs;
use std::path::Path;
use xdg::BaseDirectories;

const CONFIG_FILE: &str = "config.toml";

/// Configuration file contents. Every field is optional so files can be layered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// General application settings
    #[serde(default)]
    pub general: GeneralSettings,
    /// Code loader settings
    #[serde(default)]
    pub loader: LoaderSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralSettings {
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoaderSettings {
    pub render_timeout_ms: Option<u64>,
    pub module_pixels: Option<u32>,
    pub quiet_zone: Option<u32>,
    pub fade_delay_ms: Option<u64>,
    pub fade_duration_ms: Option<u64>,
}

/// Layered settings for the code loader and the app around it.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    config: Config,
}

impl Settings {
    /// Load configuration from the standard locations.
    pub async fn new() -> Result<Self> {
        let mut settings = Self::default();
        settings.load().await?;
        Ok(settings)
    }

    /// Parse a single configuration document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let mut settings = Self::default();
        settings.merge(toml::from_str::<Config>(source)?);
        Ok(settings)
    }

    /// Load configuration from standard locations in precedence order.
    ///
    /// Order (later overrides earlier):
    /// 1. System Data: /usr/share/levelup/config.toml (and XDG_DATA_DIRS)
    /// 2. System Config: /etc/xdg/levelup/config.toml (and XDG_CONFIG_DIRS)
    /// 3. User Config: ~/.config/levelup/config.toml (XDG_CONFIG_HOME)
    pub async fn load(&mut self) -> Result<()> {
        let xdg_dirs = BaseDirectories::with_prefix("levelup")?;

        for path in xdg_dirs.find_data_files(CONFIG_FILE).rev() {
            self.load_file(&path).await;
        }

        for path in xdg_dirs.find_config_files(CONFIG_FILE).rev() {
            self.load_file(&path).await;
        }

        let user_config_path = xdg_dirs.get_config_home().join(CONFIG_FILE);
        if user_config_path.exists() {
            self.load_file(&user_config_path).await;
        }

        Ok(())
    }

    /// Load and merge one configuration file. Unreadable or invalid files are skipped.
    pub async fn load_file(&mut self, path: &Path) {
        log::info!("Loading config from: {:?}", path);
        match fs::read_to_string(path).await {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(loaded_config) => {
                    self.merge(loaded_config);
                },
                Err(e) => {
                    log::error!("Failed to parse config file {:?}: {}", path, e);
                },
            },
            Err(e) => {
                log::warn!("Failed to read config file {:?}: {}", path, e);
            },
        }
    }

    /// Merge a loaded config into the current config.
    fn merge(&mut self, other: Config) {
        if other.general.log_level.is_some() {
            self.config.general.log_level = other.general.log_level;
        }

        let loader = &mut self.config.loader;
        let incoming = other.loader;
        loader.render_timeout_ms = incoming.render_timeout_ms.or(loader.render_timeout_ms);
        loader.module_pixels = incoming.module_pixels.or(loader.module_pixels);
        loader.quiet_zone = incoming.quiet_zone.or(loader.quiet_zone);
        loader.fade_delay_ms = incoming.fade_delay_ms.or(loader.fade_delay_ms);
        loader.fade_duration_ms = incoming.fade_duration_ms.or(loader.fade_duration_ms);
    }

    /// Get the current configuration.
    pub fn get(&self) -> &Config {
        &self.config
    }

    /// The configured log level, if any.
    pub fn log_level(&self) -> Option<&str> {
        self.config.general.log_level.as_deref()
    }

    /// Loader configuration: defaults with every configured value applied,
    /// clamped to the accepted ranges.
    pub fn loader_config(&self) -> LoaderConfig {
        let mut config = LoaderConfig::default();
        let loader = &self.config.loader;
        if let Some(ms) = loader.render_timeout_ms {
            config.render_timeout_ms = ms;
        }
        if let Some(px) = loader.module_pixels.filter(|px| *px > 0) {
            config.module_pixels = px;
        }
        if let Some(zone) = loader.quiet_zone {
            config.quiet_zone = zone;
        }
        if let Some(ms) = loader.fade_delay_ms {
            config.fade_delay_ms = ms;
        }
        if let Some(ms) = loader.fade_duration_ms {
            config.fade_duration_ms = ms;
        }
        config.clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levelup_core::config::{MAX_MODULE_PIXELS, MAX_QUIET_ZONE};

    #[test]
    fn later_documents_override_earlier() {
        let mut settings = Settings::from_toml_str(
            r#"
            [general]
            log_level = "info"

            [loader]
            module_pixels = 4
            quiet_zone = 2
            "#,
        )
        .unwrap();

        settings.merge(toml::from_str("[loader]\nmodule_pixels = 6").unwrap());

        let loader = settings.loader_config();
        assert_eq!(loader.module_pixels, 6);
        assert_eq!(loader.quiet_zone, 2);
        assert_eq!(settings.log_level(), Some("info"));
    }

    #[test]
    fn zero_module_size_is_ignored() {
        let settings = Settings::from_toml_str("[loader]\nmodule_pixels = 0").unwrap();
        assert!(settings.loader_config().module_pixels > 0);
    }

    #[test]
    fn oversized_module_size_is_clamped() {
        let settings =
            Settings::from_toml_str("[loader]\nmodule_pixels = 200000000\nquiet_zone = 999").unwrap();
        let loader = settings.loader_config();
        assert_eq!(loader.module_pixels, MAX_MODULE_PIXELS);
        assert_eq!(loader.quiet_zone, MAX_QUIET_ZONE);
    }

    #[test]
    fn load_file_merges_and_skips_garbage() {
        let dir = std::env::temp_dir().join("levelup_settings_test");
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.toml");
        let bad = dir.join("bad.toml");
        std::fs::write(&good, "[loader]\nfade_delay_ms = 42").unwrap();
        std::fs::write(&bad, "[loader\nfade_delay_ms = ").unwrap();

        let mut settings = Settings::default();
        smol::block_on(async {
            settings.load_file(&good).await;
            settings.load_file(&bad).await;
            settings.load_file(&dir.join("missing.toml")).await;
        });

        assert_eq!(settings.loader_config().fade_delay_ms, 42);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
