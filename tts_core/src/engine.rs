// External synthesis engines.
//
// Every engine is a black box behind `SynthesisEngine`: it gets text and
// the effective voice settings and hands back encoded audio bytes. Which
// engine serves requests is decided once, at startup, by `select_engine`.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{info, warn};

use crate::VoiceSettings;

pub const EDGE_TTS_ENGINE: &str = "edge-tts";
pub const HTTP_ENGINE: &str = "http";
pub const DISABLED_ENGINE: &str = "none";

#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Synthesize `text` with `voice`, returning encoded audio.
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> anyhow::Result<Vec<u8>>;

    /// Short name reported by the health endpoint.
    fn name(&self) -> &str;
}

/// Drives the `edge-tts` command line tool.
#[derive(Debug, Clone)]
pub struct EdgeTtsEngine {
    program: PathBuf,
    scratch_dir: PathBuf,
}

impl EdgeTtsEngine {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Directory for the CLI's output file before it is read back.
    pub fn with_scratch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn args(text: &str, voice: &VoiceSettings, output: &Path) -> Vec<String> {
        // `--opt=value` form: a separate "-10%" (or text starting with '-')
        // would be parsed as a flag
        vec![
            format!("--voice={}", voice.voice),
            format!("--rate={}", voice.rate),
            format!("--pitch={}", voice.pitch),
            format!("--text={}", text),
            "--write-media".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl SynthesisEngine for EdgeTtsEngine {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> anyhow::Result<Vec<u8>> {
        // Removed when dropped, including when a timeout cancels this future
        let output_path = tempfile::Builder::new()
            .prefix("edge_tts_")
            .suffix(".mp3")
            .tempfile_in(&self.scratch_dir)
            .with_context(|| format!("Failed to create output file in {}", self.scratch_dir.display()))?
            .into_temp_path();

        let output = Command::new(&self.program)
            .args(Self::args(text, voice, &output_path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out call drops this future; take the child down with it.
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "edge-tts exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        let audio = tokio::fs::read(&output_path)
            .await
            .with_context(|| format!("Failed to read edge-tts output {}", output_path.display()))?;
        if audio.is_empty() {
            return Err(anyhow::anyhow!("edge-tts wrote no audio"));
        }

        Ok(audio)
    }

    fn name(&self) -> &str {
        EDGE_TTS_ENGINE
    }
}

#[derive(Serialize)]
struct HttpSynthesisRequest<'a> {
    text: &'a str,
    voice: &'a str,
    rate: &'a str,
    pitch: &'a str,
}

/// Posts synthesis jobs to a self-hosted voice model over HTTP.
///
/// The endpoint receives `{"text", "voice", "rate", "pitch"}` and must answer
/// with the encoded audio as the response body.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    url: String,
    client: reqwest::Client,
}

impl HttpEngine {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SynthesisEngine for HttpEngine {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> anyhow::Result<Vec<u8>> {
        let body = HttpSynthesisRequest {
            text,
            voice: &voice.voice,
            rate: &voice.rate,
            pitch: &voice.pitch,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.url))?
            .error_for_status()?;

        Ok(response.bytes().await?.to_vec())
    }

    fn name(&self) -> &str {
        HTTP_ENGINE
    }
}

/// Placeholder when no engine could be set up; every call fails.
#[derive(Debug, Clone, Default)]
pub struct DisabledEngine;

#[async_trait]
impl SynthesisEngine for DisabledEngine {
    async fn synthesize(&self, _text: &str, _voice: &VoiceSettings) -> anyhow::Result<Vec<u8>> {
        Err(anyhow::anyhow!("no synthesis engine available"))
    }

    fn name(&self) -> &str {
        DISABLED_ENGINE
    }
}

/// Which engine to run, as requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineChoice {
    #[default]
    Auto,
    EdgeTts,
    Http,
    Disabled,
}

impl FromStr for EngineChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(EngineChoice::Auto),
            "edge" | "edge-tts" | "edge_tts" => Ok(EngineChoice::EdgeTts),
            "http" | "remote" => Ok(EngineChoice::Http),
            "none" | "disabled" | "off" => Ok(EngineChoice::Disabled),
            other => Err(anyhow::anyhow!(
                "unknown engine '{}' (expected auto, edge-tts, http or none)",
                other
            )),
        }
    }
}

/// Inputs for [`select_engine`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub edge_tts_program: PathBuf,
    pub remote_url: Option<String>,
    pub http_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            edge_tts_program: PathBuf::from(EDGE_TTS_ENGINE),
            remote_url: None,
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// The engine chosen at startup together with its reported name.
#[derive(Clone)]
pub struct EngineSelection {
    pub engine: Arc<dyn SynthesisEngine>,
    pub name: String,
}

impl EngineSelection {
    pub fn new(engine: Arc<dyn SynthesisEngine>) -> Self {
        let name = engine.name().to_string();
        Self { engine, name }
    }

    pub fn is_enabled(&self) -> bool {
        self.name != DISABLED_ENGINE
    }
}

impl std::fmt::Debug for EngineSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSelection")
            .field("engine", &"<dyn SynthesisEngine>")
            .field("name", &self.name)
            .finish()
    }
}

/// Resolve the engine once. `Auto` prefers the HTTP engine when a URL is
/// configured, then edge-tts when its program can be found, then disables
/// synthesis.
pub fn select_engine(choice: EngineChoice, settings: &EngineSettings) -> anyhow::Result<EngineSelection> {
    let http = |url: &str| -> anyhow::Result<EngineSelection> {
        Ok(EngineSelection::new(Arc::new(HttpEngine::new(url, settings.http_timeout)?)))
    };
    let edge = || EngineSelection::new(Arc::new(EdgeTtsEngine::new(settings.edge_tts_program.clone())));
    let remote_url = settings.remote_url.as_deref().filter(|u| !u.trim().is_empty());

    let selection = match choice {
        EngineChoice::Http => {
            let url = remote_url
                .ok_or_else(|| anyhow::anyhow!("the http engine needs TTS_REMOTE_URL to be set"))?;
            http(url)?
        }
        EngineChoice::EdgeTts => {
            if find_program(&settings.edge_tts_program).is_none() {
                warn!(
                    "{} not found on PATH; synthesis requests will fail until it is installed",
                    settings.edge_tts_program.display()
                );
            }
            edge()
        }
        EngineChoice::Disabled => EngineSelection::new(Arc::new(DisabledEngine)),
        EngineChoice::Auto => {
            if let Some(url) = remote_url {
                http(url)?
            } else if let Some(found) = find_program(&settings.edge_tts_program) {
                info!("Found edge-tts at {}", found.display());
                edge()
            } else {
                warn!("No synthesis engine available; /tts requests will fail");
                EngineSelection::new(Arc::new(DisabledEngine))
            }
        }
    };

    info!("Active synthesis engine: {}", selection.name);
    Ok(selection)
}

/// Locate `program`: explicit paths are checked directly, bare names are
/// searched for on `PATH`.
pub fn find_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
