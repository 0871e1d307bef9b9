// Configuration for the server

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tts_core::{AudioCache, EngineChoice, EngineSettings};

pub const DEFAULT_PORT: u16 = 8765;

/// Command line flags. Anything given here wins over the environment.
#[derive(Debug, Parser)]
#[command(name = "tts_server", about = "Cached text-to-speech HTTP server")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cache_dir: PathBuf,
    pub engine: EngineChoice,
    pub edge_tts_bin: PathBuf,
    pub remote_url: Option<String>,
    pub presets_file: Option<PathBuf>,
    pub synthesis_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub rate_limit_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cache_dir: AudioCache::default_dir(),
            engine: EngineChoice::Auto,
            edge_tts_bin: PathBuf::from("edge-tts"),
            remote_url: None,
            presets_file: None,
            synthesis_timeout_secs: 30,
            request_timeout_secs: 60,
            rate_limit_per_minute: 120,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let engine = match env_nonempty("TTS_ENGINE") {
            Some(v) => v.parse()?,
            None => defaults.engine,
        };

        Ok(Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            cache_dir: env_nonempty("TTS_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            engine,
            edge_tts_bin: env_nonempty("EDGE_TTS_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.edge_tts_bin),
            remote_url: env_nonempty("TTS_REMOTE_URL"),
            presets_file: env_nonempty("TTS_PRESETS_FILE").map(PathBuf::from),
            synthesis_timeout_secs: env_parse("SYNTHESIS_TIMEOUT_SECS")
                .unwrap_or(defaults.synthesis_timeout_secs),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
            rate_limit_per_minute: env_parse("RATE_LIMIT_PER_MINUTE")
                .unwrap_or(defaults.rate_limit_per_minute),
        })
    }

    /// Apply command line flags on top of the environment values.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(port) = cli.port {
            self.port = port;
        }
        self
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Interval after which one request is returned to the global bucket.
    pub fn rate_limit_period(&self) -> Duration {
        let per_minute = u64::from(self.rate_limit_per_minute.max(1));
        Duration::from_millis((60_000 / per_minute).max(1))
    }

    pub fn rate_limit_burst(&self) -> u32 {
        self.rate_limit_per_minute.max(1)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            edge_tts_program: self.edge_tts_bin.clone(),
            remote_url: self.remote_url.clone(),
            http_timeout: self.synthesis_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8765);
        assert_eq!(config.synthesis_timeout(), Duration::from_secs(30));
        assert!(config.cache_dir.ends_with("tts-server-cache"));
        assert_eq!(config.engine, EngineChoice::Auto);
    }

    #[test]
    fn test_port_flag_overrides() {
        let cli = Cli::parse_from(["tts_server", "--port", "9000"]);
        let config = ServerConfig::default().with_cli(&cli);
        assert_eq!(config.port, 9000);

        let cli = Cli::parse_from(["tts_server"]);
        let config = ServerConfig::default().with_cli(&cli);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_rejects_bad_port_flag() {
        assert!(Cli::try_parse_from(["tts_server", "--port", "not-a-port"]).is_err());
    }

    #[test]
    fn test_rate_limit_refill_matches_per_minute() {
        let config = ServerConfig::default();
        assert_eq!(config.rate_limit_period(), Duration::from_millis(500));
        assert_eq!(config.rate_limit_burst(), 120);

        for per_minute in [1, 30, 45, 90, 120, 600] {
            let config = ServerConfig {
                rate_limit_per_minute: per_minute,
                ..ServerConfig::default()
            };
            let refilled = Duration::from_secs(60).as_millis() / config.rate_limit_period().as_millis();
            assert_eq!(refilled, u128::from(per_minute), "{per_minute}/min");
        }

        let config = ServerConfig {
            rate_limit_per_minute: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.rate_limit_period(), Duration::from_secs(60));
        assert_eq!(config.rate_limit_burst(), 1);
    }

    #[test]
    fn test_engine_settings_follow_timeout() {
        let config = ServerConfig {
            synthesis_timeout_secs: 12,
            remote_url: Some("http://localhost:7860/tts".to_string()),
            ..ServerConfig::default()
        };
        let settings = config.engine_settings();
        assert_eq!(settings.http_timeout, Duration::from_secs(12));
        assert_eq!(settings.remote_url.as_deref(), Some("http://localhost:7860/tts"));
    }
}
