use serde::Serialize;
use std::{future::Future, time::Duration};
use tokio::{task::JoinHandle, time::sleep};

/// Default silence interval before a device is considered stale.
pub const SILENCE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Live,
    #[default]
    Stale,
}

impl Liveness {
    pub fn is_live(&self) -> bool {
        matches!(self, Liveness::Live)
    }
}

/// Single-shot, re-armable silence timer.
///
/// Arming cancels the pending timer, so at most one is outstanding. Every arm
/// bumps the generation; the expiry callback receives the generation it was
/// armed with and must ignore itself when [`Watchdog::generation`] moved on.
#[derive(Debug)]
pub struct Watchdog {
    timeout: Duration,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Watchdog {
            timeout,
            generation: 0,
            timer: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&mut self, on_expire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);

        let generation = self.generation;
        let timeout = self.timeout;
        self.timer = Some(tokio::spawn(async move {
            sleep(timeout).await;
            on_expire(generation).await;
        }));

        generation
    }

    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}
