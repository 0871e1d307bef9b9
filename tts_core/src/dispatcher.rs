use std::{sync::Arc, time::{Duration, Instant}};

use tracing::{debug, error, info, warn};

use crate::{
    cache::{AudioCache, CacheKey},
    engine::SynthesisEngine,
    language::{detect_language, LanguageCode},
    presets::PresetRegistry,
    SynthesisError, VoiceSettings,
};

/// Upper bound on a single engine call.
pub const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(30);

/// One synthesis job as received from a caller.
#[derive(Debug, Clone, Default)]
pub struct SynthesisRequest {
    pub text: String,
    pub lang: Option<String>,
    pub preset: Option<String>,
    pub rate: Option<String>,
    pub pitch: Option<String>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn rate(mut self, rate: impl Into<String>) -> Self {
        self.rate = Some(rate.into());
        self
    }

    pub fn pitch(mut self, pitch: impl Into<String>) -> Self {
        self.pitch = Some(pitch.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub audio: Vec<u8>,
    pub key: CacheKey,
    pub preset_id: String,
    pub language: Option<LanguageCode>,
    pub cache_hit: bool,
    pub elapsed: Duration,
}

/// Voice resolution for a request, before any cache or engine work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVoice {
    pub preset_id: String,
    /// `None` when the caller sent a tag no preset is registered for.
    pub language: Option<LanguageCode>,
    pub settings: VoiceSettings,
}

/// Resolves the voice for a request, consults the cache and calls the engine on a miss.
#[derive(Clone)]
pub struct Dispatcher {
    presets: Arc<PresetRegistry>,
    cache: AudioCache,
    engine: Arc<dyn SynthesisEngine>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        presets: Arc<PresetRegistry>,
        cache: AudioCache,
        engine: Arc<dyn SynthesisEngine>,
        timeout: Duration,
    ) -> Self {
        Self {
            presets,
            cache,
            engine,
            timeout,
        }
    }

    pub fn presets(&self) -> &PresetRegistry {
        &self.presets
    }

    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pick language, preset and effective rate/pitch for `req`.
    ///
    /// An explicit preset wins when it exists; otherwise the language's preset
    /// is used, and finally the default one. The text is only inspected when
    /// no `lang` was sent; an unrecognised tag goes straight to the default.
    pub fn resolve_voice(&self, req: &SynthesisRequest) -> ResolvedVoice {
        let language = match req.lang.as_deref() {
            None => Some(detect_language(&req.text)),
            Some(tag) => LanguageCode::parse(tag),
        };

        let preset = req
            .preset
            .as_deref()
            .and_then(|id| self.presets.get(id))
            .or_else(|| language.and_then(|lang| self.presets.for_language(lang)))
            .unwrap_or_else(|| self.presets.default_preset());

        let settings = VoiceSettings {
            voice: preset.voice.clone(),
            rate: req.rate.clone().unwrap_or_else(|| preset.rate.clone()),
            pitch: req.pitch.clone().unwrap_or_else(|| preset.pitch.clone()),
        };

        ResolvedVoice {
            preset_id: preset.id.clone(),
            language,
            settings,
        }
    }

    /// Return audio for `req`, synthesizing and caching it on a miss.
    ///
    /// Nothing is written to the cache unless the engine succeeds with
    /// non-empty audio inside the timeout.
    pub async fn synthesize_and_cache(
        &self,
        req: &SynthesisRequest,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        let start = Instant::now();

        if req.text.trim().is_empty() {
            return Err(SynthesisError::InvalidInput("text is empty".to_string()));
        }

        let resolved = self.resolve_voice(req);
        let key = CacheKey::derive(&req.text, &resolved.settings);
        let short_key = &key.as_str()[..12];

        if self.cache.has(&key).await {
            match self.cache.get(&key).await {
                Ok(audio) => {
                    debug!("Cache hit {} ({})", short_key, resolved.preset_id);
                    return Ok(SynthesisOutcome {
                        audio,
                        key,
                        preset_id: resolved.preset_id,
                        language: resolved.language,
                        cache_hit: true,
                        elapsed: start.elapsed(),
                    });
                }
                // Unreadable entry: fall through and synthesize again
                Err(e) => warn!("Cache entry {} unreadable: {e:#}", short_key),
            }
        }

        info!(
            "Synthesizing {} chars with {} ({}, {}, {}) via {}",
            req.text.chars().count(),
            resolved.preset_id,
            resolved.settings.voice,
            resolved.settings.rate,
            resolved.settings.pitch,
            self.engine.name()
        );

        let audio = match tokio::time::timeout(
            self.timeout,
            self.engine.synthesize(&req.text, &resolved.settings),
        )
        .await
        {
            Ok(Ok(audio)) if !audio.is_empty() => audio,
            Ok(Ok(_)) => {
                error!("Engine {} returned no audio for {}", self.engine.name(), short_key);
                return Err(SynthesisError::Failed(anyhow::anyhow!("engine returned no audio")));
            }
            Ok(Err(e)) => {
                error!("Synthesis failed for {}: {e:#}", short_key);
                return Err(SynthesisError::Failed(e));
            }
            Err(_) => {
                error!(
                    "Synthesis timed out after {}s for {}",
                    self.timeout.as_secs(),
                    short_key
                );
                return Err(SynthesisError::Timeout(self.timeout));
            }
        };

        // The caller still gets the audio when the cache write fails.
        if let Err(e) = self.cache.put(&key, &audio).await {
            warn!("Could not cache {}: {e:#}", short_key);
        }

        let elapsed = start.elapsed();
        info!(
            "Synthesized {} ({} bytes) in {:.2}s",
            short_key,
            audio.len(),
            elapsed.as_secs_f64()
        );

        Ok(SynthesisOutcome {
            audio,
            key,
            preset_id: resolved.preset_id,
            language: resolved.language,
            cache_hit: false,
            elapsed,
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("presets", &self.presets.ids())
            .field("cache", &self.cache.dir())
            .field("engine", &self.engine.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
