use std::{collections::HashMap, fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::language::LanguageCode;

/// Id of the preset used whenever nothing better matches.
pub const DEFAULT_PRESET_ID: &str = "jesus_en";

/// A named bundle of voice parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicePreset {
    #[serde(skip)]
    pub id: String,
    pub voice: String,
    pub rate: String,
    pub pitch: String,
    pub description: String,
}

impl VoicePreset {
    fn new(id: &str, voice: &str, rate: &str, pitch: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            voice: voice.to_string(),
            rate: rate.to_string(),
            pitch: pitch.to_string(),
            description: description.to_string(),
        }
    }
}

// On-disk layout for `from_file`
#[derive(Deserialize)]
struct PresetFile {
    default: String,
    presets: HashMap<String, PresetFileEntry>,
}

#[derive(Deserialize)]
struct PresetFileEntry {
    voice: String,
    rate: String,
    pitch: String,
    #[serde(default)]
    description: String,
    lang: Option<String>,
}

/// Immutable preset table built once at startup and shared with the dispatcher.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    // Insertion order is kept so /health and /voices are stable.
    presets: Vec<VoicePreset>,
    by_language: HashMap<LanguageCode, String>,
    default_id: String,
}

impl PresetRegistry {
    /// The built-in presets, one warm male voice per supported language.
    pub fn builtin() -> Self {
        let presets = vec![
            VoicePreset::new(
                "jesus_en",
                "en-US-AndrewMultilingualNeural",
                "-10%",
                "-3Hz",
                "Warm, confident, authentic male (English)",
            ),
            VoicePreset::new(
                "jesus_pt",
                "pt-BR-AntonioNeural",
                "-12%",
                "-4Hz",
                "Warm, friendly male (Portuguese BR)",
            ),
            VoicePreset::new("jesus_es", "es-MX-JorgeNeural", "-10%", "-3Hz", "Warm male (Spanish)"),
            VoicePreset::new("jesus_fr", "fr-FR-HenriNeural", "-10%", "-3Hz", "Warm male (French)"),
            VoicePreset::new("jesus_it", "it-IT-DiegoNeural", "-10%", "-3Hz", "Warm male (Italian)"),
            VoicePreset::new("jesus_de", "de-DE-ConradNeural", "-10%", "-3Hz", "Warm male (German)"),
        ];

        let by_language = LanguageCode::ALL
            .iter()
            .map(|lang| (*lang, format!("jesus_{}", lang.as_str())))
            .collect();

        Self {
            presets,
            by_language,
            default_id: DEFAULT_PRESET_ID.to_string(),
        }
    }

    /// Load presets from a JSON file of the form
    /// `{"default": "id", "presets": {"id": {"voice", "rate", "pitch", "description", "lang"}}}`
    pub fn from_file<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
        let file: PresetFile = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a valid presets file", p.as_ref().display()))?;

        if file.presets.is_empty() {
            return Err(anyhow::anyhow!("presets file defines no presets"));
        }
        if !file.presets.contains_key(&file.default) {
            return Err(anyhow::anyhow!(
                "default preset '{}' is not defined in the presets file",
                file.default
            ));
        }

        let mut ids: Vec<&String> = file.presets.keys().collect();
        ids.sort();

        let mut presets = Vec::with_capacity(ids.len());
        let mut by_language = HashMap::new();
        for id in ids {
            let entry = &file.presets[id];
            if let Some(tag) = entry.lang.as_deref() {
                let lang = LanguageCode::parse(tag)
                    .ok_or_else(|| anyhow::anyhow!("unsupported language '{}' for preset {}", tag, id))?;
                by_language.insert(lang, id.clone());
            }
            presets.push(VoicePreset::new(
                id,
                &entry.voice,
                &entry.rate,
                &entry.pitch,
                &entry.description,
            ));
        }

        Ok(Self {
            presets,
            by_language,
            default_id: file.default,
        })
    }

    pub fn get(&self, id: &str) -> Option<&VoicePreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    /// Preset for `id`, silently falling back to the default for unknown or absent ids.
    pub fn resolve(&self, id: Option<&str>) -> &VoicePreset {
        id.and_then(|id| self.get(id))
            .unwrap_or_else(|| self.default_preset())
    }

    /// Preset mapped to a language, if any.
    pub fn for_language(&self, lang: LanguageCode) -> Option<&VoicePreset> {
        self.by_language.get(&lang).and_then(|id| self.get(id))
    }

    pub fn default_preset(&self) -> &VoicePreset {
        // Both constructors guarantee the default id is present.
        self.get(&self.default_id)
            .unwrap_or(&self.presets[0])
    }

    pub fn ids(&self) -> Vec<String> {
        self.presets.iter().map(|p| p.id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VoicePreset> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
