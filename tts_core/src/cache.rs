// Content-addressed audio cache on the local filesystem.
//
// Entries are plain files named `<key>.mp3`. They are written once, never
// modified and never expired by this process.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Context;
use sha2::{Digest, Sha256};

use crate::VoiceSettings;

const AUDIO_EXTENSION: &str = "mp3";

/// Name of the cache directory under the platform temp dir.
pub const DEFAULT_CACHE_DIR_NAME: &str = "tts-server-cache";

/// Hex SHA-256 of `(text, voice, rate, pitch)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(text: &str, voice: &VoiceSettings) -> Self {
        let mut hasher = Sha256::new();
        // Length-prefix every field so "a:b" + "c" never collides with "a" + "b:c".
        for field in [text, voice.voice.as_str(), voice.rate.as_str(), voice.pitch.as_str()] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct AudioCache {
    dir: PathBuf,
}

impl AudioCache {
    /// Default location: a dedicated subdirectory of the platform temp dir.
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME)
    }

    /// Open (and create if needed) a cache rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key.as_str(), AUDIO_EXTENSION))
    }

    pub async fn has(&self, key: &CacheKey) -> bool {
        tokio::fs::try_exists(self.path_for(key))
            .await
            .unwrap_or(false)
    }

    pub async fn get(&self, key: &CacheKey) -> anyhow::Result<Vec<u8>> {
        let path = self.path_for(key);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read cache entry {}", path.display()))
    }

    /// Store `audio` under `key`.
    ///
    /// The bytes go to a uniquely named staging file first and are then
    /// renamed into place, so a reader never sees a half-written entry and two
    /// writers racing on the same key simply overwrite each other.
    pub async fn put(&self, key: &CacheKey, audio: &[u8]) -> anyhow::Result<()> {
        let target = self.path_for(key);
        let staging = self
            .dir
            .join(format!(".{}.{}.part", key.as_str(), uuid::Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&staging, audio).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e).with_context(|| format!("Failed to write {}", staging.display()));
        }

        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e).with_context(|| format!("Failed to commit {}", target.display()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(voice: &str, rate: &str, pitch: &str) -> VoiceSettings {
        VoiceSettings {
            voice: voice.to_string(),
            rate: rate.to_string(),
            pitch: pitch.to_string(),
        }
    }

    #[test]
    fn test_key_is_stable_hex() {
        let v = settings("en-US-AndrewMultilingualNeural", "-10%", "-3Hz");
        let a = CacheKey::derive("Peace be with you", &v);
        let b = CacheKey::derive("Peace be with you", &v);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_changes_with_every_field() {
        let base = settings("voice", "-10%", "-3Hz");
        let key = CacheKey::derive("hello", &base);

        assert_ne!(key, CacheKey::derive("hello!", &base));
        assert_ne!(key, CacheKey::derive("hello", &settings("other", "-10%", "-3Hz")));
        assert_ne!(key, CacheKey::derive("hello", &settings("voice", "-12%", "-3Hz")));
        assert_ne!(key, CacheKey::derive("hello", &settings("voice", "-10%", "-4Hz")));
    }

    #[test]
    fn test_key_field_boundaries() {
        let a = CacheKey::derive("a:b", &settings("c", "r", "p"));
        let b = CacheKey::derive("a", &settings("b:c", "r", "p"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::open(dir.path().join("nested/cache")).unwrap();
        let key = CacheKey::derive("hi", &settings("v", "r", "p"));

        assert!(!cache.has(&key).await);
        cache.put(&key, b"ID3audio").await.unwrap();
        assert!(cache.has(&key).await);
        assert_eq!(cache.get(&key).await.unwrap(), b"ID3audio");
        assert_eq!(
            cache.path_for(&key).file_name().unwrap().to_string_lossy(),
            format!("{}.mp3", key)
        );
    }

    #[tokio::test]
    async fn test_put_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::open(dir.path()).unwrap();
        let key = CacheKey::derive("hi", &settings("v", "r", "p"));

        cache.put(&key, b"one").await.unwrap();
        cache.put(&key, b"two").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.mp3", key)]);
        assert_eq!(cache.get(&key).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_get_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::open(dir.path()).unwrap();
        let key = CacheKey::derive("nothing", &settings("v", "r", "p"));
        assert!(cache.get(&key).await.is_err());
    }
}
