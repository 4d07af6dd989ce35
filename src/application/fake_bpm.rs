//! Synthetic heart-rate source.
//!
//! Posts a looping ramp to the bridge's own endpoint, so generated values take
//! exactly the same path as an external sensor app.

use crate::domain::models::BpmPayload;
use crate::domain::settings::FakeBpmSettings;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// `min, min+step, .., max, min, ..` forever.
#[derive(Debug, Clone)]
pub struct BpmRamp {
    min: i32,
    max: i32,
    step: i32,
    next: i32,
}

impl BpmRamp {
    pub fn new(settings: &FakeBpmSettings) -> Self {
        let min = settings.min.min(settings.max);
        let max = settings.min.max(settings.max);
        Self {
            min,
            max,
            step: settings.step.max(1),
            next: min,
        }
    }
}

impl Iterator for BpmRamp {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        let current = self.next;
        self.next = match current.checked_add(self.step) {
            Some(n) if n <= self.max => n,
            _ => self.min,
        };
        Some(current)
    }
}

pub struct FakeBpmGenerator {
    client: reqwest::Client,
    endpoint: String,
    interval: Duration,
    ramp: BpmRamp,
}

impl FakeBpmGenerator {
    pub fn new(endpoint: impl Into<String>, settings: &FakeBpmSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            interval: settings.interval(),
            ramp: BpmRamp::new(settings),
        }
    }

    /// Run until the returned handle is stopped or dropped.
    pub fn spawn(self) -> FakeBpmHandle {
        FakeBpmHandle {
            task: tokio::spawn(self.run()),
        }
    }

    async fn run(self) {
        info!("Fake BPM generator posting to {}", self.endpoint);
        let mut ticker = tokio::time::interval(self.interval);
        for bpm in self.ramp {
            ticker.tick().await;
            let result = self
                .client
                .post(&self.endpoint)
                .json(&BpmPayload { bpm })
                .send()
                .await
                .and_then(|response| response.error_for_status());
            match result {
                Ok(_) => debug!("Fake BPM {} posted", bpm),
                Err(e) => warn!("Fake BPM {} not delivered: {}", bpm, e),
            }
        }
    }
}

pub struct FakeBpmHandle {
    task: JoinHandle<()>,
}

impl FakeBpmHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        self.task.abort();
        info!("Fake BPM generator stopped");
    }
}

impl Drop for FakeBpmHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
