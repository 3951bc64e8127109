//! Session configuration
//!
//! Player settings read once at startup. Sources are layered: serde defaults,
//! then an optional config file, then `CLOUBIT_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{PlaybackError, Result};
use crate::types::DEFAULT_VOLUME;

/// Settings that shape session behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Start playing when the persisted track is restored at startup
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,

    /// Restore the persisted seek position at startup
    #[serde(default = "default_save_seek")]
    pub save_seek: bool,

    /// Report listened time when switching away from a track
    #[serde(default)]
    pub scrobble: bool,

    /// Play/pause fade in milliseconds (0 = no fade)
    #[serde(default)]
    pub fade_ms: u32,

    /// Volume used when the store is empty (0.0-1.0)
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    /// Consecutive unplayable tracks to skip before stopping
    /// (`None` = queue length)
    #[serde(default)]
    pub max_skip_attempts: Option<usize>,
}

impl SessionConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path.to_path_buf()).required(false));
        }

        // CLOUBIT_FADE_MS=300, CLOUBIT_AUTOPLAY=false, ...
        settings =
            settings.add_source(config::Environment::with_prefix("CLOUBIT").try_parsing(true));

        let config = settings
            .build()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| PlaybackError::Config(e.to_string()))
    }

    /// Fade duration, `None` when fades are off
    pub fn fade(&self) -> Option<Duration> {
        (self.fade_ms > 0).then(|| Duration::from_millis(u64::from(self.fade_ms)))
    }
}

fn default_autoplay() -> bool {
    true
}

fn default_save_seek() -> bool {
    true
}

fn default_volume() -> f32 {
    DEFAULT_VOLUME
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autoplay: default_autoplay(),
            save_seek: default_save_seek(),
            scrobble: false,
            fade_ms: 0,
            default_volume: default_volume(),
            max_skip_attempts: None,
        }
    }
}
