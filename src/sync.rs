//! Completion bridge: submit a task, poll its progress, return the images.
//!
//! Each `*_sync` call drives one bridge through
//! `Submitted -> Polling -> {Succeeded, Failed}`. Polls are awaited one at a
//! time on a fixed cadence; ticks that elapse while a poll is still in flight
//! are skipped, never queued, so terminal states are observed in order.

use crate::client::NovitaClient;
use crate::embed::read_imgs_to_base64;
use crate::error::{
    metadata_keys, reasons, Metadata, NovitaError, Result, ERROR_TASK_NOT_STARTED,
    TRANSPORT_ERROR_CODE,
};
use crate::transport::RequestOpts;
use crate::types::{
    ImgType, Img2ImgRequest, Progress, SyncConfig, TaskHandle, TaskStatus, Txt2ImgRequest,
    UpscaleRequest,
};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Where a bridge is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgePhase {
    Submitted,
    Polling,
    Succeeded,
    Failed,
}

impl fmt::Display for BridgePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgePhase::Submitted => "submitted",
            BridgePhase::Polling => "polling",
            BridgePhase::Succeeded => "succeeded",
            BridgePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a single progress snapshot means for the bridge.
enum Step {
    Continue,
    Succeeded(Vec<String>),
    Failed(NovitaError),
}

/// One polling state machine, bound to one task.
struct Bridge<'a> {
    client: &'a NovitaClient,
    task_id: String,
    config: &'a SyncConfig,
    opts: &'a RequestOpts,
    phase: BridgePhase,
    attempts: u32,
}

impl<'a> Bridge<'a> {
    fn new(
        client: &'a NovitaClient,
        task_id: String,
        config: &'a SyncConfig,
        opts: &'a RequestOpts,
    ) -> Self {
        Self {
            client,
            task_id,
            config,
            opts,
            phase: BridgePhase::Submitted,
            attempts: 0,
        }
    }

    fn transition(&mut self, next: BridgePhase) {
        tracing::debug!(task_id = %self.task_id, from = %self.phase, to = %next, "bridge transition");
        self.phase = next;
    }

    async fn run(mut self) -> Result<Vec<String>> {
        self.transition(BridgePhase::Polling);

        // The deadline bounds polling only; delivery runs after it.
        let polled = match self.config.timeout {
            Some(limit) => {
                let task_id = self.task_id.clone();
                match time::timeout(limit, self.poll_until_terminal()).await {
                    Ok(polled) => polled,
                    Err(_) => Err(bound_error(
                        &task_id,
                        reasons::TASK_TIMEOUT,
                        format!("Task did not finish within {:?}", limit),
                        None,
                    )),
                }
            }
            None => self.poll_until_terminal().await,
        };

        let outcome = match polled {
            Ok(imgs) => self.deliver(imgs).await,
            Err(err) => Err(err),
        };

        if outcome.is_err() && self.phase != BridgePhase::Failed {
            self.transition(BridgePhase::Failed);
        }

        match &outcome {
            Ok(imgs) => tracing::info!(task_id = %self.task_id, images = imgs.len(), "task succeeded"),
            Err(err) => tracing::warn!(task_id = %self.task_id, error = %err, "task did not succeed"),
        }
        outcome
    }

    /// Polls until a terminal status and returns the result URLs.
    async fn poll_until_terminal(&mut self) -> Result<Vec<String>> {
        // `interval_at` rejects a zero period.
        let period = self.config.interval.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let max_attempts = self.config.max_attempts.map(|max| max.max(1));

        loop {
            ticker.tick().await;
            self.attempts += 1;

            let snapshot = match self.client.progress(&self.task_id, self.opts).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    self.transition(BridgePhase::Failed);
                    return Err(err);
                }
            };
            tracing::debug!(
                task_id = %self.task_id,
                attempt = self.attempts,
                status = %snapshot.status,
                progress = snapshot.progress,
                "polled task progress"
            );

            match self.evaluate(snapshot) {
                Step::Continue => {
                    if max_attempts.is_some_and(|max| self.attempts >= max) {
                        self.transition(BridgePhase::Failed);
                        return Err(bound_error(
                            &self.task_id,
                            reasons::POLL_ATTEMPTS_EXHAUSTED,
                            format!("Task did not finish after {} poll(s)", self.attempts),
                            Some(self.attempts),
                        ));
                    }
                }
                Step::Succeeded(imgs) => {
                    self.transition(BridgePhase::Succeeded);
                    return Ok(imgs);
                }
                Step::Failed(err) => {
                    self.transition(BridgePhase::Failed);
                    return Err(err);
                }
            }
        }
    }

    fn evaluate(&self, snapshot: Progress) -> Step {
        match snapshot.status {
            TaskStatus::Succeeded => Step::Succeeded(snapshot.imgs),
            status if status.is_failure() => Step::Failed(NovitaError::task_failed(
                &self.task_id,
                status.code(),
                snapshot.failed_reason.as_deref(),
            )),
            _ => Step::Continue,
        }
    }

    async fn deliver(&self, imgs: Vec<String>) -> Result<Vec<String>> {
        match self.config.img_type {
            ImgType::Url => Ok(imgs),
            ImgType::Base64 => read_imgs_to_base64(self.client.http(), &imgs).await,
        }
    }
}

fn bound_error(task_id: &str, reason: &str, message: String, attempts: Option<u32>) -> NovitaError {
    let mut metadata = Metadata::new();
    metadata.insert(metadata_keys::TASK_ID.to_string(), Value::from(task_id));
    if let Some(attempts) = attempts {
        metadata.insert(metadata_keys::ATTEMPTS.to_string(), Value::from(attempts));
    }
    NovitaError::new(TRANSPORT_ERROR_CODE, message)
        .with_reason(reason)
        .with_metadata(metadata)
}

fn started_task_id(handle: TaskHandle) -> Result<String> {
    match handle.id() {
        Some(id) => Ok(id.to_string()),
        None => Err(NovitaError::new(TRANSPORT_ERROR_CODE, ERROR_TASK_NOT_STARTED)),
    }
}

impl NovitaClient {
    /// Waits for an already submitted task to finish and returns its images.
    ///
    /// The first poll happens one `config.interval` after the call. Polling
    /// stops at the first terminal status, at the first failed poll, or when
    /// one of the optional bounds of `config` is reached. Poll errors are
    /// returned as-is and never retried.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use novita::{NovitaClient, RequestOpts, SyncConfig};
    /// # #[tokio::main]
    /// # async fn main() -> anyhow::Result<()> {
    /// # let client = NovitaClient::new(Some("your_api_key".to_string()))?;
    /// let imgs = client
    ///     .wait_for_images("some_task_id", &SyncConfig::default(), &RequestOpts::default())
    ///     .await?;
    /// println!("generated: {:?}", imgs);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn wait_for_images(
        &self,
        task_id: &str,
        config: &SyncConfig,
        opts: &RequestOpts,
    ) -> Result<Vec<String>> {
        Bridge::new(self, task_id.to_string(), config, opts)
            .run()
            .await
    }

    /// Runs a text-to-image task to completion.
    ///
    /// Returns the image URLs, or base64 strings when
    /// `config.img_type` is [`ImgType::Base64`], in generation order.
    pub async fn txt2img_sync(
        &self,
        params: &Txt2ImgRequest,
        config: &SyncConfig,
        opts: &RequestOpts,
    ) -> Result<Vec<String>> {
        let task_id = started_task_id(self.txt2img(params, opts).await?)?;
        self.wait_for_images(&task_id, config, opts).await
    }

    /// Runs an image-to-image task to completion.
    pub async fn img2img_sync(
        &self,
        params: &Img2ImgRequest,
        config: &SyncConfig,
        opts: &RequestOpts,
    ) -> Result<Vec<String>> {
        let task_id = started_task_id(self.img2img(params, opts).await?)?;
        self.wait_for_images(&task_id, config, opts).await
    }

    /// Runs an upscale task to completion.
    pub async fn upscale_sync(
        &self,
        params: &UpscaleRequest,
        config: &SyncConfig,
        opts: &RequestOpts,
    ) -> Result<Vec<String>> {
        let task_id = started_task_id(self.upscale(params, opts).await?)?;
        self.wait_for_images(&task_id, config, opts).await
    }
}
