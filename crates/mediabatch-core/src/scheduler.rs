//! Cooperative scheduling: pause, resume and cancel for long-running loops.
//!
//! Every long loop in the engine calls [`Scheduler::checkpoint`] once per
//! iteration. A checkpoint returns immediately while the current time slice
//! lasts, yields to the runtime once it is used up, blocks while the batch is
//! paused and fails with [`Cancelled`] once the batch is cancelled.
//!
//! The control state lives in a [`BatchControl`] handle the caller keeps and
//! may drive from another task (a Ctrl+C handler, a UI).

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::SchedulerConfig;

/// Run state shared between the engine and its controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Cancelled,
}

/// Returned by a checkpoint once the batch was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Aborted by user")]
pub struct Cancelled;

/// Cloneable handle to pause, resume or cancel a running batch.
#[derive(Debug, Clone)]
pub struct BatchControl {
    state: Arc<watch::Sender<RunState>>,
}

impl BatchControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunState::Running);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.state() == RunState::Paused
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == RunState::Cancelled
    }

    /// Block the batch at its next checkpoint.
    pub fn pause(&self) {
        self.state.send_if_modified(|state| {
            if *state == RunState::Running {
                *state = RunState::Paused;
                true
            } else {
                false
            }
        });
    }

    /// Let a paused batch continue.
    pub fn resume(&self) {
        self.state.send_if_modified(|state| {
            if *state == RunState::Paused {
                *state = RunState::Running;
                true
            } else {
                false
            }
        });
    }

    /// Stop the batch at its next checkpoint. Sticky until [`rearm`](Self::rearm).
    pub fn cancel(&self) {
        self.state.send_replace(RunState::Cancelled);
    }

    /// Return to running, e.g. when the engine is reset for a new run.
    pub fn rearm(&self) {
        self.state.send_replace(RunState::Running);
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }
}

impl Default for BatchControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Time-slice bookkeeping for one engine operation.
#[derive(Debug)]
pub struct Scheduler {
    slice: Duration,
    resume_delay: Duration,
    control: BatchControl,
    slice_start: Instant,
}

impl Scheduler {
    pub fn new(config: &SchedulerConfig, control: BatchControl) -> Self {
        Self {
            slice: config.slice(),
            resume_delay: config.resume_delay(),
            control,
            slice_start: Instant::now(),
        }
    }

    pub fn control(&self) -> &BatchControl {
        &self.control
    }

    /// Suspend point.
    pub async fn checkpoint(&mut self) -> Result<(), Cancelled> {
        match self.control.state() {
            RunState::Cancelled => return Err(Cancelled),
            RunState::Paused => {
                self.wait_while_paused().await?;
                self.slice_start = Instant::now();
                return Ok(());
            }
            RunState::Running => {}
        }

        if self.slice_start.elapsed() >= self.slice {
            if self.resume_delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.resume_delay).await;
            }
            self.slice_start = Instant::now();
            if self.control.is_cancelled() {
                return Err(Cancelled);
            }
        }
        Ok(())
    }

    async fn wait_while_paused(&self) -> Result<(), Cancelled> {
        let mut rx = self.control.subscribe();
        tracing::info!("Batch paused");
        loop {
            let state = *rx.borrow_and_update();
            match state {
                RunState::Running => {
                    tracing::info!("Batch resumed");
                    return Ok(());
                }
                RunState::Cancelled => return Err(Cancelled),
                RunState::Paused => {}
            }
            if rx.changed().await.is_err() {
                return Err(Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_checkpoint_running() {
        let mut scheduler = Scheduler::new(&SchedulerConfig::default(), BatchControl::new());
        for _ in 0..100 {
            scheduler.checkpoint().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_checkpoint_cancelled() {
        let control = BatchControl::new();
        let mut scheduler = Scheduler::new(&SchedulerConfig::default(), control.clone());
        control.cancel();
        assert_eq!(scheduler.checkpoint().await, Err(Cancelled));
        // Cancellation is sticky
        control.resume();
        assert_eq!(scheduler.checkpoint().await, Err(Cancelled));
    }

    #[tokio::test]
    async fn test_checkpoint_blocks_while_paused() {
        let control = BatchControl::new();
        let mut scheduler = Scheduler::new(&SchedulerConfig::default(), control.clone());
        control.pause();

        let resumer = control.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            resumer.resume();
        });

        let start = std::time::Instant::now();
        scheduler.checkpoint().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(25));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_while_paused() {
        let control = BatchControl::new();
        let mut scheduler = Scheduler::new(&SchedulerConfig::default(), control.clone());
        control.pause();

        let canceller = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        assert_eq!(scheduler.checkpoint().await, Err(Cancelled));
    }

    #[tokio::test]
    async fn test_slice_expiry_sleeps_resume_delay() {
        let config = SchedulerConfig {
            slice_ms: 1,
            resume_delay_ms: 20,
            pause_poll_ms: 100,
        };
        let mut scheduler = Scheduler::new(&config, BatchControl::new());
        tokio::time::sleep(Duration::from_millis(2)).await;

        let start = std::time::Instant::now();
        scheduler.checkpoint().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_pause_does_not_override_cancel() {
        let control = BatchControl::new();
        control.cancel();
        control.pause();
        assert!(control.is_cancelled());
        control.rearm();
        assert_eq!(control.state(), RunState::Running);
    }
}
