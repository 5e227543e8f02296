//! Background routing sweeper.
//!
//! Polls the open routing rounds on an interval: silent candidates past the
//! response TTL are recorded as timeouts, and rounds past their deadline
//! with no winner fail their orders. Sweep-pull only; there are no
//! per-response timers to leak.

use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use tradeflow_events::{EventBus, TransitionEvent};

use crate::state_machine::OrderStateMachine;

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often to scan the open rounds.
    pub poll_interval: Duration,
    /// Thread name for logging.
    pub name: String,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            name: "routing-sweeper".to_string(),
        }
    }
}

impl SweeperConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Sweeper runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SweeperStats {
    pub sweeps: u64,
    pub timeouts_recorded: u64,
    pub orders_failed: u64,
}

/// Handle to control a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<SweeperStats>>,
}

impl SweeperHandle {
    /// Request graceful shutdown and wait for the thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }

    pub fn stats(&self) -> SweeperStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Spawn the sweeper in a background thread.
pub fn spawn<B>(machine: Arc<OrderStateMachine<B>>, config: SweeperConfig) -> SweeperHandle
where
    B: EventBus<TransitionEvent> + 'static,
{
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    let stats = Arc::new(Mutex::new(SweeperStats::default()));
    let stats_clone = stats.clone();

    let name = config.name.clone();
    let join = thread::Builder::new()
        .name(name)
        .spawn(move || {
            sweeper_loop(machine, config, shutdown_rx, stats_clone);
        })
        .expect("failed to spawn routing sweeper thread");

    SweeperHandle {
        shutdown: shutdown_tx,
        join: Some(join),
        stats,
    }
}

fn sweeper_loop<B>(
    machine: Arc<OrderStateMachine<B>>,
    config: SweeperConfig,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<SweeperStats>>,
) where
    B: EventBus<TransitionEvent>,
{
    info!(sweeper = %config.name, "routing sweeper started");
    loop {
        // The interval doubles as the shutdown poll.
        match shutdown_rx.recv_timeout(config.poll_interval) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        let report = machine.sweep(Utc::now());
        debug!(
            sweeper = %config.name,
            rounds = report.rounds_checked,
            timeouts = report.timeouts_recorded,
            failed = report.orders_failed,
            "sweep pass"
        );

        let mut s = stats.lock().unwrap();
        s.sweeps += 1;
        s.timeouts_recorded += report.timeouts_recorded;
        s.orders_failed += report.orders_failed;
    }
    info!(sweeper = %config.name, "routing sweeper stopped");
}
