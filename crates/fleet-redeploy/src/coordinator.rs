//! Redeploy trigger coordinator
//!
//! A single task owns the pending table. Producers only ever enqueue; the
//! task matches events against trigger rules, keeps one deadline per pending
//! service set and hands closed windows to delivery tasks.

use crate::config::{CoordinatorConfig, RetryConfig};
use crate::error::{CoordinatorError, DeliveryError, Result};
use crate::request::{RedeployRequest, ServiceSet};
use crate::sink::RedeploySink;
use crate::stats::{CoordinatorStats, StatsSnapshot};
use fleet_types::{ChangeEvent, EventId, TriggerRule};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

/// Sleep target when nothing is pending
const IDLE_WAKEUP: Duration = Duration::from_secs(3600);

enum Command {
    Event { event: ChangeEvent, arrived: Instant },
    Shutdown(oneshot::Sender<()>),
}

/// Open coalescing window for one service set
struct Pending {
    deadline: Instant,
    causes: Vec<(Instant, EventId)>,
    rules: BTreeSet<String>,
}

impl Pending {
    fn open(arrived: Instant, window: Duration) -> Self {
        Self {
            deadline: arrived + window,
            causes: Vec::new(),
            rules: BTreeSet::new(),
        }
    }
}

enum Outcome {
    Delivered { attempts: u32 },
    Undelivered { attempts: u32, last_error: DeliveryError },
}

struct Settled {
    request: RedeployRequest,
    outcome: Outcome,
}

/// Producer-side handle; cheap to clone
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
    stats: Arc<CoordinatorStats>,
}

impl CoordinatorHandle {
    /// Enqueue a change event. Never waits.
    pub fn submit(&self, event: ChangeEvent) -> Result<()> {
        self.tx
            .send(Command::Event {
                event,
                arrived: Instant::now(),
            })
            .map_err(|_| CoordinatorError::Closed)?;
        self.stats.record_submitted();
        Ok(())
    }

    /// Stop intake, flush every pending window and wait for deliveries to settle
    pub async fn shutdown(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown(done_tx))
            .map_err(|_| CoordinatorError::Closed)?;
        done_rx.await.map_err(|_| CoordinatorError::Closed)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Turns change events into coalesced, acknowledged redeploy requests
pub struct RedeployCoordinator {
    rules: Vec<TriggerRule>,
    config: CoordinatorConfig,
    sink: Arc<dyn RedeploySink>,
    stats: Arc<CoordinatorStats>,

    /// Service set -> open window
    pending: HashMap<ServiceSet, Pending>,

    /// Sets with a request being delivered; their next window is held
    in_flight: HashSet<ServiceSet>,

    settled_tx: mpsc::UnboundedSender<Settled>,
}

impl RedeployCoordinator {
    /// Start the coordinator task on the current runtime
    pub fn spawn(
        rules: Vec<TriggerRule>,
        config: CoordinatorConfig,
        sink: Arc<dyn RedeploySink>,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, commands) = mpsc::unbounded_channel();
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(CoordinatorStats::default());

        let coordinator = Self {
            rules,
            config,
            sink,
            stats: stats.clone(),
            pending: HashMap::new(),
            in_flight: HashSet::new(),
            settled_tx,
        };
        let task = tokio::spawn(coordinator.run(commands, settled_rx));

        (CoordinatorHandle { tx, stats }, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut settled_rx: mpsc::UnboundedReceiver<Settled>,
    ) {
        info!(
            rules = self.rules.len(),
            window_secs = self.config.window_secs,
            "Redeploy coordinator started"
        );

        let mut waiters = Vec::new();
        loop {
            let next = self.next_deadline();
            let wakeup = sleep_until(next.unwrap_or_else(|| Instant::now() + IDLE_WAKEUP));

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Event { event, arrived }) => self.on_event(event, arrived),
                    Some(Command::Shutdown(done)) => {
                        waiters.push(done);
                        break;
                    }
                    None => break,
                },
                Some(settled) = settled_rx.recv() => self.on_settled(settled),
                _ = wakeup, if next.is_some() => self.flush_due(Some(Instant::now())),
            }
        }

        // Intake is closed; whatever was already queued still counts
        commands.close();
        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Event { event, arrived } => self.on_event(event, arrived),
                Command::Shutdown(done) => waiters.push(done),
            }
        }

        info!(
            pending = self.pending.len(),
            in_flight = self.in_flight.len(),
            "Draining redeploy coordinator"
        );
        loop {
            self.flush_due(None);
            if self.pending.is_empty() && self.in_flight.is_empty() {
                break;
            }
            match settled_rx.recv().await {
                Some(settled) => self.on_settled(settled),
                None => break,
            }
        }

        for done in waiters {
            let _ = done.send(());
        }
        info!("Redeploy coordinator stopped");
    }

    fn on_event(&mut self, event: ChangeEvent, arrived: Instant) {
        let matched: Vec<&TriggerRule> = self
            .rules
            .iter()
            .filter(|rule| rule.pattern.matches(&event))
            .collect();
        self.stats.record_match(!matched.is_empty());

        if matched.is_empty() {
            debug!(event_id = %event.id, "Event matched no trigger rule");
            return;
        }

        let window = self.config.window();
        for rule in matched {
            let set = ServiceSet::from(rule.services.clone());
            let pending = self
                .pending
                .entry(set.clone())
                .or_insert_with(|| Pending::open(arrived, window));
            pending.rules.insert(rule.name.clone());

            if pending.causes.iter().any(|(_, id)| id == &event.id) {
                debug!(event_id = %event.id, services = %set, "Event already pending for set");
                continue;
            }
            pending.causes.push((arrived, event.id.clone()));

            debug!(
                event_id = %event.id,
                rule = %rule.name,
                services = %set,
                causes = pending.causes.len(),
                "Event coalesced into pending window"
            );
        }
    }

    /// Earliest deadline among sets that may flush
    fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .iter()
            .filter(|(set, _)| !self.in_flight.contains(*set))
            .map(|(_, pending)| pending.deadline)
            .min()
    }

    /// Flush windows due at `now`, or every window when `now` is `None`
    fn flush_due(&mut self, now: Option<Instant>) {
        let mut due: Vec<(Instant, ServiceSet)> = self
            .pending
            .iter()
            .filter(|(set, pending)| {
                !self.in_flight.contains(*set) && now.map_or(true, |now| pending.deadline <= now)
            })
            .map(|(set, pending)| (pending.deadline, set.clone()))
            .collect();
        due.sort();

        for (_, set) in due {
            if let Some(pending) = self.pending.remove(&set) {
                self.flush(set, pending);
            }
        }
    }

    fn flush(&mut self, set: ServiceSet, mut pending: Pending) {
        pending.causes.sort();
        let causes = pending.causes.into_iter().map(|(_, id)| id).collect();
        let request = RedeployRequest::new(set.clone(), causes, pending.rules);

        self.stats.record_dispatched();
        info!(
            request_id = %request.request_id,
            services = %set,
            causes = request.cause_event_ids.len(),
            "Dispatching redeploy request"
        );

        self.in_flight.insert(set);
        let sink = self.sink.clone();
        let retry = self.config.retry.clone();
        let stats = self.stats.clone();
        let settled_tx = self.settled_tx.clone();
        tokio::spawn(async move {
            let outcome = deliver_with_retry(sink.as_ref(), &request, &retry, &stats).await;
            let _ = settled_tx.send(Settled { request, outcome });
        });
    }

    fn on_settled(&mut self, settled: Settled) {
        let Settled { request, outcome } = settled;
        self.in_flight.remove(&request.services);

        match outcome {
            Outcome::Delivered { attempts } => {
                self.stats.record_delivered();
                info!(
                    request_id = %request.request_id,
                    services = %request.services,
                    attempts,
                    "Redeploy request acknowledged"
                );
            }
            Outcome::Undelivered {
                attempts,
                last_error,
            } => {
                self.stats.record_undelivered();
                error!(
                    request_id = %request.request_id,
                    services = %request.services,
                    causes = ?request.cause_event_ids,
                    attempts,
                    error = %last_error,
                    "Redeploy request undelivered, dropping"
                );
            }
        }
    }
}

async fn deliver_with_retry(
    sink: &dyn RedeploySink,
    request: &RedeployRequest,
    retry: &RetryConfig,
    stats: &CoordinatorStats,
) -> Outcome {
    let attempts = retry.attempts();
    let mut last_error = DeliveryError::NotAcknowledged;

    for attempt in 1..=attempts {
        let result = match timeout(retry.ack_timeout(), sink.deliver(request)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(retry.ack_timeout_ms)),
        };

        match result {
            Ok(()) => return Outcome::Delivered { attempts: attempt },
            Err(e) => {
                if attempt < attempts {
                    let delay = retry.backoff(attempt);
                    warn!(
                        request_id = %request.request_id,
                        services = %request.services,
                        attempt,
                        error = %e,
                        retry_in = ?delay,
                        "Redeploy delivery failed, retrying"
                    );
                    stats.record_retry();
                    sleep(delay).await;
                }
                last_error = e;
            }
        }
    }

    Outcome::Undelivered {
        attempts,
        last_error,
    }
}
