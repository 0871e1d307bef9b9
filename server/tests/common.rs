//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use tower::ServiceExt;
use tts_core::{AudioCache, Dispatcher, PresetRegistry, SynthesisEngine, VoiceSettings};
use tts_server::{router, AppState};

/// Engine double that records calls and returns deterministic fake MP3 bytes.
#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<(String, VoiceSettings)>>,
    fail: bool,
}

impl FakeEngine {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, VoiceSettings)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SynthesisEngine for FakeEngine {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> anyhow::Result<Vec<u8>> {
        self.calls.lock().unwrap().push((text.to_string(), voice.clone()));
        if self.fail {
            return Err(anyhow::anyhow!("edge-tts exited with status 1"));
        }
        Ok(format!("ID3|{}|{}|{}|{}", voice.voice, voice.rate, voice.pitch, text).into_bytes())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub struct TestApp {
    pub router: Router,
    pub engine: Arc<FakeEngine>,
    pub cache_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_engine(FakeEngine::default())
    }

    pub fn with_engine(engine: FakeEngine) -> Self {
        let cache_dir = tempfile::tempdir().expect("temp cache dir");
        let cache = AudioCache::open(cache_dir.path()).expect("open cache");
        let engine = Arc::new(engine);
        let dispatcher = Dispatcher::new(
            Arc::new(PresetRegistry::builtin()),
            cache,
            engine.clone(),
            Duration::from_secs(5),
        );

        Self {
            router: router(AppState::new(dispatcher)),
            engine,
            cache_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str, body: impl Into<Body>) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
    }

    pub fn cached_files(&self) -> usize {
        std::fs::read_dir(self.cache_dir.path()).unwrap().count()
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
