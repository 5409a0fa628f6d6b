//! Scripted in-memory implementation of `UploadApi`.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use facturas::{PollError, SubmissionError, UploadApi, UploadStatusResponse, ValidFile};

/// One scripted answer to a status request.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(UploadStatusResponse),
    Fail(PollError),
}

#[derive(Default)]
struct FakeState {
    submit_ids: VecDeque<String>,
    submit_error: Option<SubmissionError>,
    scripts: HashMap<String, VecDeque<Step>>,
    /// Answer repeated once a script runs out.
    last: HashMap<String, Step>,
    submitted: Vec<String>,
    fetches: Vec<String>,
}

/// Fake backend. Clones share state, so a test can keep a handle after
/// moving one into a coordinator.
#[derive(Clone, Default)]
pub struct FakeUploadApi {
    state: Arc<Mutex<FakeState>>,
    latency: Option<Duration>,
}

impl FakeUploadApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every status request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Ids returned by successive submits.
    pub fn accept_as(self, ids: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .submit_ids
            .extend(ids.iter().map(|id| id.to_string()));
        self
    }

    pub fn reject_submit(self, error: SubmissionError) -> Self {
        self.state.lock().unwrap().submit_error = Some(error);
        self
    }

    /// Queues status answers for `upload_id`. The last step repeats.
    pub fn script(self, upload_id: &str, steps: Vec<Step>) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .entry(upload_id.to_string())
            .or_default()
            .extend(steps);
        self
    }

    pub fn submit_count(&self) -> usize {
        self.state.lock().unwrap().submitted.len()
    }

    pub fn submitted_names(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetches.len()
    }

    pub fn fetch_count_for(&self, upload_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .fetches
            .iter()
            .filter(|id| id.as_str() == upload_id)
            .count()
    }
}

#[async_trait]
impl UploadApi for FakeUploadApi {
    async fn submit(&self, file: &ValidFile) -> Result<String, SubmissionError> {
        let mut state = self.state.lock().unwrap();
        state.submitted.push(file.name().to_string());
        if let Some(error) = state.submit_error.clone() {
            return Err(error);
        }
        state
            .submit_ids
            .pop_front()
            .ok_or_else(|| SubmissionError::InvalidResponse("no scripted upload id".to_string()))
    }

    async fn fetch_status(&self, upload_id: &str) -> Result<UploadStatusResponse, PollError> {
        let step = {
            let mut state = self.state.lock().unwrap();
            state.fetches.push(upload_id.to_string());
            let next = state
                .scripts
                .get_mut(upload_id)
                .and_then(|steps| steps.pop_front());
            match next {
                Some(step) => {
                    state.last.insert(upload_id.to_string(), step.clone());
                    step
                }
                None => state.last.get(upload_id).cloned().unwrap_or_else(|| {
                    Step::Fail(PollError::Status {
                        status: 404,
                        detail: "Upload not found".to_string(),
                    })
                }),
            }
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match step {
            Step::Respond(response) => Ok(response),
            Step::Fail(error) => Err(error),
        }
    }
}
