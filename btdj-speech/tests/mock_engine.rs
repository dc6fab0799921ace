//! Recording speech engine for arbiter tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btdj_speech::{Result, SpeechEngine, SpeechError};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// Records every utterance and optionally blocks until released
pub struct RecordingEngine {
    name: String,
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
    fail: bool,
    active: Mutex<usize>,
    max_active: Mutex<usize>,
}

impl RecordingEngine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            started: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            gate: None,
            fail: false,
            active: Mutex::new(0),
            max_active: Mutex::new(0),
        }
    }

    /// Each utterance waits for one permit on the returned semaphore
    pub fn gated(name: &str) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut engine = Self::new(name);
        engine.gate = Some(Arc::clone(&gate));
        (engine, gate)
    }

    pub fn failing(name: &str) -> Self {
        let mut engine = Self::new(name);
        engine.fail = true;
        engine
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        *self.max_active.lock()
    }

    /// Wait until at least `count` utterances have started
    pub async fn wait_started(&self, count: usize) {
        for _ in 0..200 {
            if self.started.lock().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{} never started {} utterances", self.name, count);
    }

    /// Wait until at least `count` utterances have completed
    pub async fn wait_finished(&self, count: usize) {
        for _ in 0..200 {
            if self.finished.lock().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{} never finished {} utterances", self.name, count);
    }
}

#[async_trait]
impl SpeechEngine for RecordingEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn speak(&self, text: &str) -> Result<()> {
        self.started.lock().push(text.to_string());
        {
            let mut active = self.active.lock();
            *active += 1;
            let mut max = self.max_active.lock();
            *max = (*max).max(*active);
        }

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        *self.active.lock() -= 1;
        if self.fail {
            return Err(SpeechError::RenderFailed {
                engine: self.name.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        self.finished.lock().push(text.to_string());
        Ok(())
    }
}

/// Engine that panics on every call
pub struct PanickingEngine;

#[async_trait]
impl SpeechEngine for PanickingEngine {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn speak(&self, _text: &str) -> Result<()> {
        panic!("speech backend crashed");
    }
}
