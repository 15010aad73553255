/// Simulation configuration
use anyhow::{bail, Context, Result};
use relay_playback::{AudioTrack, PlayerConfig, TrackContext};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimConfig {
    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default = "default_tracks")]
    pub tracks: Vec<SimTrack>,

    /// Real time between two frame pulls
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Skip each track after this many delivered frames
    #[serde(default)]
    pub skip_after_frames: Option<u64>,

    /// Stop pulling after this many polls even if the queue is not drained
    #[serde(default = "default_max_polls")]
    pub max_polls: u64,
}

/// One queued track, optionally bounded to a sub-range
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimTrack {
    pub id: String,
    pub title: String,

    #[serde(default)]
    pub length_ms: u64,

    #[serde(default)]
    pub stream: bool,

    #[serde(default)]
    pub start_ms: Option<u64>,

    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl SimTrack {
    pub fn to_context(&self) -> Arc<TrackContext> {
        let track = if self.stream {
            AudioTrack::stream(&self.id, &self.title)
        } else {
            AudioTrack::new(&self.id, &self.title, self.length_ms)
        };
        let track = Arc::new(track);

        match (self.start_ms, self.duration_ms) {
            (Some(start), Some(duration)) => Arc::new(TrackContext::split(
                &self.id,
                track,
                format!("{} ({}s-{}s)", self.title, start / 1000, (start + duration) / 1000),
                start,
                duration,
            )),
            _ => Arc::new(TrackContext::new(&self.id, track)),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            player: PlayerConfig::default(),
            tracks: default_tracks(),
            frame_interval_ms: default_frame_interval_ms(),
            skip_after_frames: None,
            max_polls: default_max_polls(),
        }
    }
}

impl SimConfig {
    /// Load configuration from file and environment
    ///
    /// `path` defaults to `relay-sim.toml` in the working directory and is
    /// optional in that case. Environment variables prefixed with `RELAY_`
    /// override file values; nested keys use `__` (`RELAY_PLAYER__HISTORY_SIZE`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("relay-sim.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings.build().context("Failed to read configuration")?;
        let config: Self = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tracks.is_empty() {
            bail!("No tracks configured");
        }
        if self.frame_interval_ms == 0 {
            bail!("frame_interval_ms must be at least 1");
        }

        for track in &self.tracks {
            if track.stream {
                if self.skip_after_frames.is_none() {
                    bail!(
                        "Track `{}` is a stream and never ends; set skip_after_frames",
                        track.id
                    );
                }
                continue;
            }
            if track.length_ms == 0 {
                bail!("Track `{}` has no length", track.id);
            }
            if let (Some(start), Some(duration)) = (track.start_ms, track.duration_ms) {
                if start.saturating_add(duration) > track.length_ms {
                    bail!(
                        "Track `{}` range {}ms+{}ms runs past its length of {}ms",
                        track.id,
                        start,
                        duration,
                        track.length_ms
                    );
                }
            }
        }

        Ok(())
    }
}

// Default values
fn default_tracks() -> Vec<SimTrack> {
    vec![
        SimTrack {
            id: "sim://opening".to_string(),
            title: "Opening".to_string(),
            length_ms: 1_000,
            stream: false,
            start_ms: None,
            duration_ms: None,
        },
        SimTrack {
            id: "sim://mix".to_string(),
            title: "Mix".to_string(),
            length_ms: 6_000,
            stream: false,
            start_ms: Some(2_000),
            duration_ms: Some(1_000),
        },
        SimTrack {
            id: "sim://closing".to_string(),
            title: "Closing".to_string(),
            length_ms: 600,
            stream: false,
            start_ms: None,
            duration_ms: None,
        },
    ]
}

fn default_frame_interval_ms() -> u64 {
    2
}

fn default_max_polls() -> u64 {
    100_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.player.history_size, 20);
        assert!(config.tracks[1].to_context().is_split());
    }

    #[test]
    fn loads_tracks_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
frame_interval_ms = 1
skip_after_frames = 10

[player]
history_size = 5

[[tracks]]
id = "sim://a"
title = "A"
length_ms = 2000

[[tracks]]
id = "sim://b"
title = "B"
length_ms = 4000
start_ms = 1000
duration_ms = 500
"#
        )
        .unwrap();

        let config = SimConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.frame_interval_ms, 1);
        assert_eq!(config.skip_after_frames, Some(10));
        assert_eq!(config.player.history_size, 5);
        assert_eq!(config.player.initial_volume, 1.0);
        assert_eq!(config.tracks.len(), 2);

        let context = config.tracks[1].to_context();
        assert_eq!(context.start_position_ms(), 1000);
        assert_eq!(context.end_marker_ms(), Some(1500));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(SimConfig::load(Some(Path::new("/nonexistent/relay-sim.toml"))).is_err());
    }

    #[test]
    fn range_past_track_end_is_rejected() {
        let mut config = SimConfig::default();
        config.tracks[1].duration_ms = Some(10_000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn stream_requires_skip() {
        let mut config = SimConfig::default();
        config.tracks.push(SimTrack {
            id: "sim://radio".to_string(),
            title: "Radio".to_string(),
            length_ms: 0,
            stream: true,
            start_ms: None,
            duration_ms: None,
        });
        assert!(config.validate().is_err());

        config.skip_after_frames = Some(50);
        assert!(config.validate().is_ok());
    }
}
