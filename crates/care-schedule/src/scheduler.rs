//! Scheduler
//!
//! Runs each enabled schedule in its own tokio task until shutdown.

use std::sync::Arc;
use std::time::Duration;

use care_core::Marketplace;
use chrono::{NaiveDateTime, Utc};
use cron::Schedule as CronSchedule;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{Job, ScheduleConfig, ScheduleTask};
use crate::error::Result;

/// Handle to a running scheduler
pub struct SchedulerHandle {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop every schedule and wait for running jobs to finish
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

pub struct Scheduler {
    config: ScheduleConfig,
    marketplace: Arc<Marketplace>,
}

impl Scheduler {
    /// Fails if any cron expression is invalid
    pub fn new(config: ScheduleConfig, marketplace: Arc<Marketplace>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            marketplace,
        })
    }

    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        // Subscribe before spawning so a stop issued right away is not missed
        let tasks: Vec<_> = self
            .config
            .enabled_tasks()
            .into_iter()
            .map(|task| (task.clone(), shutdown_tx.subscribe()))
            .collect();
        let marketplace = self.marketplace;

        let handle = tokio::spawn(async move {
            info!("Scheduler started ({} schedules)", tasks.len());

            let mut task_handles = Vec::new();
            for (task, mut rx) in tasks {
                let marketplace = Arc::clone(&marketplace);
                task_handles.push(tokio::spawn(async move {
                    run_schedule_task(task, marketplace, &mut rx).await;
                }));
            }

            for handle in task_handles {
                let _ = handle.await;
            }

            info!("Scheduler stopped");
        });

        SchedulerHandle {
            shutdown_tx,
            handle,
        }
    }
}

async fn run_schedule_task(
    task: ScheduleTask,
    marketplace: Arc<Marketplace>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) {
    let schedule: CronSchedule = match task.schedule() {
        Ok(s) => s,
        Err(e) => {
            error!(task = %task.name, "{}", e);
            return;
        }
    };

    info!(task = %task.name, cron = %task.cron, job = %task.job, "Schedule active");

    loop {
        let now = Utc::now();
        let next = match schedule.upcoming(Utc).next() {
            Some(t) => t,
            None => {
                warn!(task = %task.name, "No upcoming run time");
                break;
            }
        };

        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                match execute_job(task.job, &marketplace, Utc::now().naive_utc()).await {
                    Ok(count) => {
                        info!(task = %task.name, "Job {} done ({} changed)", task.job, count);
                    }
                    Err(e) => {
                        error!(task = %task.name, "Job {} failed: {}", task.job, e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!(task = %task.name, "Shutdown requested");
                break;
            }
        }
    }
}

/// Run one job against the marketplace, returning how many requests it touched
async fn execute_job(job: Job, marketplace: &Marketplace, now: NaiveDateTime) -> Result<usize> {
    let count = match job {
        Job::Reminders => marketplace.send_reminders(now).await?,
        Job::AutoComplete => marketplace.complete_finished(now).await?,
        Job::ExpireStale => marketplace.expire_stale(now).await?,
    };
    Ok(count)
}
