use serde::Deserialize;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Default render timeout in milliseconds.
pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 10_000;

/// Largest accepted module edge length in pixels.
pub const MAX_MODULE_PIXELS: u32 = 64;

/// Widest accepted quiet zone in modules.
pub const MAX_QUIET_ZONE: u32 = 16;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file is not valid TOML for the expected schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Code loader configuration.
///
/// **Render timeout:** Can be configured via `LEVELUP_RENDER_TIMEOUT_MS`.
/// A value of `0` disables the timeout, so a render that never finishes
/// leaves its request pending forever.
///
/// **Module size:** Can be configured via `LEVELUP_MODULE_PIXELS`.
/// Module size and quiet zone are clamped to [MAX_MODULE_PIXELS] and
/// [MAX_QUIET_ZONE].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// How long a background render may take before the request fails.
    pub render_timeout_ms: u64,
    /// Edge length of a single code module in pixels.
    pub module_pixels: u32,
    /// Width of the blank border around the code, in modules.
    pub quiet_zone: u32,
    /// Delay between the first code being shown and the color fade starting.
    pub fade_delay_ms: u64,
    /// Duration of the color fade.
    pub fade_duration_ms: u64,
}

impl LoaderConfig {
    /// Parse a loader configuration from a TOML table.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        Ok(config.clamped())
    }

    /// Bring the module size and quiet zone into their accepted ranges.
    pub fn clamped(mut self) -> Self {
        let module_pixels = self.module_pixels.clamp(1, MAX_MODULE_PIXELS);
        if module_pixels != self.module_pixels {
            log::warn!("module_pixels={} out of range, using {}", self.module_pixels, module_pixels);
            self.module_pixels = module_pixels;
        }
        let quiet_zone = self.quiet_zone.min(MAX_QUIET_ZONE);
        if quiet_zone != self.quiet_zone {
            log::warn!("quiet_zone={} out of range, using {}", self.quiet_zone, quiet_zone);
            self.quiet_zone = quiet_zone;
        }
        self
    }

    /// The render timeout, or [None] if renders may run forever.
    pub fn render_timeout(&self) -> Option<Duration> {
        match self.render_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Delay before the one-shot color fade starts.
    pub fn fade_delay(&self) -> Duration {
        Duration::from_millis(self.fade_delay_ms)
    }

    /// Length of the color fade.
    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let render_timeout_ms = match std::env::var("LEVELUP_RENDER_TIMEOUT_MS") {
            Ok(val) => match val.trim().parse::<u64>() {
                Ok(ms) => {
                    log::info!("LEVELUP_RENDER_TIMEOUT_MS={} detected", ms);
                    ms
                },
                Err(_) => {
                    log::warn!(
                        "Invalid LEVELUP_RENDER_TIMEOUT_MS={}, using {}ms",
                        val,
                        DEFAULT_RENDER_TIMEOUT_MS
                    );
                    DEFAULT_RENDER_TIMEOUT_MS
                },
            },
            Err(_) => DEFAULT_RENDER_TIMEOUT_MS,
        };

        let module_pixels = match std::env::var("LEVELUP_MODULE_PIXELS") {
            Ok(val) => match val.trim().parse::<u32>() {
                Ok(px) if (1..=MAX_MODULE_PIXELS).contains(&px) => px,
                _ => {
                    log::warn!("Invalid LEVELUP_MODULE_PIXELS={}, using 8", val);
                    8
                },
            },
            Err(_) => 8,
        };

        Self {
            render_timeout_ms,
            module_pixels,
            quiet_zone: 4,
            fade_delay_ms: 500,
            fade_duration_ms: 400,
        }
    }
}

/// Configuration structure for the integrated [TaskRunner](crate::tasks::runner::TaskRunner).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TasksConfig {
    /// The stack size of each thread of the task runner thread pool. Defaults to 1 MB.
    pub stack_size: usize,
    /// The amount of worker threads of the task runner thread pool. Defaults to half of the available threads.
    pub workers: NonZeroUsize,
}

impl Default for TasksConfig {
    fn default() -> Self {
        let half = std::thread::available_parallelism()
            .map(|n| n.get() / 2)
            .unwrap_or(1);

        Self {
            stack_size: 1024 * 1024, // 1 MB
            workers: NonZeroUsize::new(half).unwrap_or(NonZeroUsize::MIN),
        }
    }
}
