// libs/appointment-cell/src/services/jobs.rs
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::models::AppointmentError;
use crate::services::collaborators::{DeferredJob, JobScheduler};

/// Executes a deferred job once its delay has elapsed.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: DeferredJob) -> Result<(), AppointmentError>;
}

/// Hands jobs to the notification transport by logging them; the transport
/// itself (email, messaging) lives outside this service.
pub struct LoggingJobRunner;

#[async_trait]
impl JobRunner for LoggingJobRunner {
    async fn run(&self, job: DeferredJob) -> Result<(), AppointmentError> {
        info!("Dispatching deferred job for appointment {}: {:?}", job.appointment_id(), job);
        Ok(())
    }
}

/// Scheduler backed by detached tokio tasks. Jobs do not survive a restart.
pub struct TokioJobScheduler {
    runner: Arc<dyn JobRunner>,
}

impl TokioJobScheduler {
    pub fn new(runner: Arc<dyn JobRunner>) -> Self {
        Self { runner }
    }
}

impl JobScheduler for TokioJobScheduler {
    fn schedule(&self, job: DeferredJob, delay: Duration) {
        debug!("Scheduling {:?} in {:?}", job, delay);
        let runner = self.runner.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let appointment_id = job.appointment_id();
            if let Err(e) = runner.run(job).await {
                warn!("Deferred job for appointment {} failed: {}", appointment_id, e);
            }
        });
    }
}

/// Keeps scheduled jobs in memory for inspection.
#[derive(Default)]
pub struct RecordingJobScheduler {
    jobs: Mutex<Vec<(DeferredJob, Duration)>>,
}

impl RecordingJobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<(DeferredJob, Duration)> {
        match self.jobs.lock() {
            Ok(jobs) => jobs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl JobScheduler for RecordingJobScheduler {
    fn schedule(&self, job: DeferredJob, delay: Duration) {
        match self.jobs.lock() {
            Ok(mut jobs) => jobs.push((job, delay)),
            Err(poisoned) => poisoned.into_inner().push((job, delay)),
        }
    }
}
