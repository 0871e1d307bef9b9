// Voice presets, language detection, the audio cache and the synthesis
// dispatcher behind the TTS server.

pub mod cache;
pub mod dispatcher;
pub mod engine;
pub mod language;
pub mod presets;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cache::{AudioCache, CacheKey};
pub use dispatcher::{Dispatcher, ResolvedVoice, SynthesisOutcome, SynthesisRequest, DEFAULT_SYNTHESIS_TIMEOUT};
pub use engine::{
    select_engine, DisabledEngine, EdgeTtsEngine, EngineChoice, EngineSelection, EngineSettings,
    HttpEngine, SynthesisEngine,
};
pub use language::{detect_language, LanguageCode};
pub use presets::{PresetRegistry, VoicePreset, DEFAULT_PRESET_ID};

/// Effective voice configuration handed to an engine: the preset's values
/// with any per-request rate/pitch overrides applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub voice: String,
    pub rate: String,
    pub pitch: String,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0:#}")]
    Failed(anyhow::Error),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}
