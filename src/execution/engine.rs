//! Pipeline controller - drives a provisioning run stage by stage

use crate::{
    admin::{AdminClient, AdminError, AdminRequest},
    core::{
        stage_at, Credential, PipelinePhase, PipelineState, ProgressSnapshot, ProvisionError,
        StageCatalog, StageKind,
    },
    execution::{StallPolicy, Throttle},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events that can occur during a provisioning run
#[derive(Debug, Clone)]
pub enum ProvisionEvent {
    RunStarted {
        run_id: Uuid,
        total_stages: usize,
    },
    StageStarted {
        stage_index: usize,
        title: &'static str,
        items: usize,
    },
    ItemDispatched {
        stage_index: usize,
        item: usize,
        label: String,
        attempt: u32,
    },
    ItemSucceeded {
        stage_index: usize,
        item: usize,
        label: String,
    },
    ItemFailed {
        stage_index: usize,
        item: usize,
        label: String,
        error: String,
    },
    StageCompleted {
        stage_index: usize,
        title: &'static str,
    },
    Halted {
        stage_index: usize,
        error: String,
    },
    ErrorCleared {
        stage_index: usize,
    },
    ItemsRetried {
        stage_index: usize,
        count: usize,
    },
    RunCompleted {
        run_id: Uuid,
    },
    RunAborted {
        run_id: Uuid,
        stage_index: usize,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ProvisionEvent) + Send + Sync>;

/// Completion signals sent back to the controller by scheduled work
#[derive(Debug)]
enum Signal {
    Dispatched {
        stage: usize,
        item: usize,
        attempt: u32,
    },
    ItemSucceeded {
        stage: usize,
        item: usize,
        attempt: u32,
    },
    ItemFailed {
        stage: usize,
        item: usize,
        attempt: u32,
        error: AdminError,
    },
    SettleElapsed {
        stage: usize,
    },
}

/// Operator commands, each answered on a oneshot
#[derive(Debug)]
enum Command {
    ClearError {
        reply: oneshot::Sender<bool>,
    },
    RetryFailed {
        reply: oneshot::Sender<Result<usize, ProvisionError>>,
    },
    Abort {
        reply: oneshot::Sender<()>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemStatus {
    Scheduled,
    InFlight,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
struct WorkItem {
    request: AdminRequest,
    attempt: u32,
    status: ItemStatus,
}

/// Provisioning pipeline controller
///
/// Holds what every run shares: the admin client, the stage catalog and the
/// timing policies. Each call to [`PipelineController::start`] spawns an
/// independent run.
pub struct PipelineController<C> {
    client: Arc<C>,
    catalog: Arc<StageCatalog>,
    throttle: Throttle,
    stall: StallPolicy,
    event_handlers: Vec<EventHandler>,
}

impl<C: AdminClient + 'static> PipelineController<C> {
    pub fn new(client: C, catalog: StageCatalog) -> Self {
        Self {
            client: Arc::new(client),
            catalog: Arc::new(catalog),
            throttle: Throttle::default(),
            stall: StallPolicy::default(),
            event_handlers: Vec::new(),
        }
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_stall_policy(mut self, stall: StallPolicy) -> Self {
        self.stall = stall;
        self
    }

    /// Add an event handler; applies to runs started afterwards
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ProvisionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Start a run with the given secret key
    ///
    /// An empty key is rejected before anything is spawned. Must be called
    /// from within a tokio runtime.
    pub fn start(&self, secret_key: impl Into<String>) -> Result<PipelineHandle, ProvisionError> {
        let credential = Credential::new(secret_key)?;
        let run_id = Uuid::new_v4();
        let total_stages = self.catalog.total_stages();

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = watch::channel(ProgressSnapshot::idle(total_stages));

        let run = RunLoop {
            run_id,
            client: self.client.clone(),
            catalog: self.catalog.clone(),
            throttle: self.throttle,
            stall: self.stall,
            handlers: self.event_handlers.clone(),
            state: PipelineState::new(credential, total_stages),
            items: Vec::new(),
            settle_scheduled: false,
            last_dispatch_at: None,
            aborted: false,
            signal_tx,
            token: CancellationToken::new(),
            progress: progress_tx,
        };

        info!(run_id = %run_id, stages = total_stages, "Starting provisioning run");
        tokio::spawn(run.run(signal_rx, command_rx));

        Ok(PipelineHandle {
            run_id,
            commands: command_tx,
            progress: progress_rx,
        })
    }
}

/// Operator-side handle to a running pipeline
///
/// Dropping the handle aborts the run.
#[derive(Debug)]
pub struct PipelineHandle {
    run_id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    progress: watch::Receiver<ProgressSnapshot>,
}

impl PipelineHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Subscribe to progress snapshots
    pub fn progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.clone()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        (*self.progress.borrow()).clone()
    }

    /// Dismiss the current error; returns whether one was set
    ///
    /// Failed items are not resubmitted.
    pub async fn clear_error(&self) -> Result<bool, ProvisionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ClearError { reply })?;
        rx.await.map_err(|_| ProvisionError::ControllerGone)
    }

    /// Re-dispatch the failed items of the current stage, returning how
    /// many were resubmitted
    ///
    /// The error must be cleared first.
    pub async fn retry_failed(&self) -> Result<usize, ProvisionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RetryFailed { reply })?;
        rx.await.map_err(|_| ProvisionError::ControllerGone)?
    }

    /// Cancel the run; scheduled work that has not fired yet never will
    pub async fn abort(&self) -> Result<(), ProvisionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Abort { reply })?;
        rx.await.map_err(|_| ProvisionError::ControllerGone)
    }

    /// Wait until the run is halted, complete or aborted
    pub async fn wait_until_settled(&self) -> ProgressSnapshot {
        self.wait_for(|snapshot| snapshot.phase.is_settled()).await
    }

    /// Wait for the first snapshot matching `predicate`
    ///
    /// Returns the last snapshot if the run ends without one matching.
    pub async fn wait_for<F>(&self, predicate: F) -> ProgressSnapshot
    where
        F: Fn(&ProgressSnapshot) -> bool,
    {
        let mut rx = self.progress.clone();
        loop {
            {
                let current = rx.borrow_and_update();
                if predicate(&*current) {
                    return (*current).clone();
                }
            }
            if rx.changed().await.is_err() {
                return (*rx.borrow()).clone();
            }
        }
    }

    fn send(&self, command: Command) -> Result<(), ProvisionError> {
        self.commands
            .send(command)
            .map_err(|_| ProvisionError::ControllerGone)
    }
}

/// The single task that owns a run's state
struct RunLoop<C> {
    run_id: Uuid,
    client: Arc<C>,
    catalog: Arc<StageCatalog>,
    throttle: Throttle,
    stall: StallPolicy,
    handlers: Vec<EventHandler>,
    state: PipelineState,
    items: Vec<WorkItem>,
    settle_scheduled: bool,
    /// When the latest scheduled call of the run goes out
    last_dispatch_at: Option<Instant>,
    aborted: bool,
    signal_tx: mpsc::UnboundedSender<Signal>,
    token: CancellationToken,
    progress: watch::Sender<ProgressSnapshot>,
}

impl<C: AdminClient + 'static> RunLoop<C> {
    async fn run(
        mut self,
        mut signals: mpsc::UnboundedReceiver<Signal>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        self.emit(ProvisionEvent::RunStarted {
            run_id: self.run_id,
            total_stages: self.state.total_stages(),
        });
        if self.state.is_complete() {
            self.finish();
        } else {
            self.dispatch_stage();
        }
        self.publish();

        while !self.is_finished() {
            tokio::select! {
                Some(signal) = signals.recv() => self.on_signal(signal),
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        warn!(run_id = %self.run_id, "Handle dropped, aborting run");
                        self.abort();
                    }
                },
            }
            self.publish();
        }

        debug!(run_id = %self.run_id, "Run loop finished");
    }

    fn is_finished(&self) -> bool {
        self.aborted || self.state.is_complete()
    }

    fn emit(&self, event: ProvisionEvent) {
        for handler in &self.handlers {
            handler(event.clone());
        }
    }

    fn phase(&self) -> PipelinePhase {
        let stage = self.state.stage_index();
        if self.aborted {
            PipelinePhase::Aborted
        } else if self.state.is_complete() {
            PipelinePhase::Complete
        } else if self.state.is_halted() {
            PipelinePhase::Halted(stage)
        } else if self
            .items
            .iter()
            .any(|item| item.status == ItemStatus::Scheduled)
        {
            PipelinePhase::Dispatching(stage)
        } else {
            PipelinePhase::Awaiting(stage)
        }
    }

    fn publish(&self) {
        let snapshot = ProgressSnapshot::from_state(self.run_id, self.phase(), &self.state);
        self.progress.send_replace(snapshot);
    }

    fn stage_kind(&self) -> Option<StageKind> {
        stage_at(self.state.stage_index()).map(|stage| stage.kind)
    }

    /// Build and schedule the work of the current stage
    fn dispatch_stage(&mut self) {
        let index = self.state.stage_index();
        let Some(stage) = stage_at(index) else {
            return;
        };

        let requests = self.catalog.work_items(stage);
        info!(
            stage = index,
            key = %stage.key,
            items = requests.len(),
            "Creating {}...",
            stage.title
        );
        self.emit(ProvisionEvent::StageStarted {
            stage_index: index,
            title: stage.title,
            items: requests.len(),
        });

        if stage.kind == StageKind::FanOut {
            self.state.begin_fan_out(requests.len());
        }

        self.items = requests
            .into_iter()
            .map(|request| WorkItem {
                request,
                attempt: 1,
                status: ItemStatus::Scheduled,
            })
            .collect();

        for item in 0..self.items.len() {
            let delay = match stage.kind {
                StageKind::Single => Duration::ZERO,
                StageKind::FanOut => self.throttle.fan_out_offset(item),
            };
            self.schedule_item(item, delay);
        }

        // A fan-out over nothing is already complete
        self.check_stage_complete();
    }

    /// Schedule one call; its outcome comes back as signals
    fn schedule_item(&mut self, item: usize, delay: Duration) {
        let due = Instant::now() + delay;
        self.last_dispatch_at = Some(self.last_dispatch_at.map_or(due, |at| at.max(due)));

        let stage = self.state.stage_index();
        let work = &self.items[item];
        let attempt = work.attempt;
        let request = work.request.clone();
        let credential = self.state.credential().clone();
        let client = self.client.clone();
        let signals = self.signal_tx.clone();
        let item_timeout = self.stall.item_timeout;

        self.throttle
            .schedule_after(delay, self.token.clone(), async move {
                let _ = signals.send(Signal::Dispatched {
                    stage,
                    item,
                    attempt,
                });

                let call = client.execute(&credential, &request);
                let outcome = match item_timeout {
                    Some(limit) => match tokio::time::timeout(limit, call).await {
                        Ok(result) => result,
                        Err(_) => Err(AdminError::Timeout(limit)),
                    },
                    None => call.await,
                };

                let signal = match outcome {
                    Ok(_) => Signal::ItemSucceeded {
                        stage,
                        item,
                        attempt,
                    },
                    Err(error) => Signal::ItemFailed {
                        stage,
                        item,
                        attempt,
                        error,
                    },
                };
                let _ = signals.send(signal);
            });
    }

    /// Whether a signal refers to the live attempt of a current-stage item
    fn is_current(&self, stage: usize, item: usize, attempt: u32) -> bool {
        stage == self.state.stage_index()
            && self
                .items
                .get(item)
                .is_some_and(|work| work.attempt == attempt)
    }

    fn on_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Dispatched {
                stage,
                item,
                attempt,
            } => {
                if !self.is_current(stage, item, attempt) {
                    return;
                }
                let work = &mut self.items[item];
                if work.status == ItemStatus::Scheduled {
                    work.status = ItemStatus::InFlight;
                }
                let label = work.request.label();
                debug!(stage, item, attempt, "Dispatched {}", label);
                self.emit(ProvisionEvent::ItemDispatched {
                    stage_index: stage,
                    item,
                    label,
                    attempt,
                });
            }
            Signal::ItemSucceeded {
                stage,
                item,
                attempt,
            } => {
                if !self.is_current(stage, item, attempt) {
                    debug!(stage, item, attempt, "Ignoring stale success");
                    return;
                }
                self.record_success(item);
            }
            Signal::ItemFailed {
                stage,
                item,
                attempt,
                error,
            } => {
                if !self.is_current(stage, item, attempt) {
                    debug!(stage, item, attempt, "Ignoring stale failure");
                    return;
                }
                self.record_failure(item, error);
            }
            Signal::SettleElapsed { stage } => {
                if stage == self.state.stage_index() {
                    self.advance();
                }
            }
        }
    }

    fn record_success(&mut self, item: usize) {
        if self.items[item].status == ItemStatus::Succeeded {
            return;
        }
        self.items[item].status = ItemStatus::Succeeded;

        let stage = self.state.stage_index();
        let label = self.items[item].request.label();
        info!(stage, item, "{} succeeded", label);
        self.emit(ProvisionEvent::ItemSucceeded {
            stage_index: stage,
            item,
            label,
        });

        let stage_done = match self.stage_kind() {
            Some(StageKind::FanOut) => self.state.record_subtask_success(),
            _ => true,
        };
        if stage_done {
            self.check_stage_complete();
        }
    }

    fn record_failure(&mut self, item: usize, error: AdminError) {
        let stage = self.state.stage_index();
        let label = self.items[item].request.label();
        self.items[item].status = ItemStatus::Failed;

        let message = error.to_string();
        warn!(stage, item, error = %message, "{} failed", label);
        self.emit(ProvisionEvent::ItemFailed {
            stage_index: stage,
            item,
            label,
            error: message.clone(),
        });

        self.state.report_error(message.clone());
        self.emit(ProvisionEvent::Halted {
            stage_index: stage,
            error: message,
        });
    }

    /// Schedule the settle delay once every call of the stage has succeeded
    fn check_stage_complete(&mut self) {
        if self.settle_scheduled || self.state.is_halted() {
            return;
        }
        let done = match self.stage_kind() {
            Some(StageKind::FanOut) => self.state.subtasks_complete(),
            _ => self
                .items
                .iter()
                .all(|work| work.status == ItemStatus::Succeeded),
        };
        if !done {
            return;
        }

        let stage = self.state.stage_index();
        if let Some(descriptor) = stage_at(stage) {
            info!(stage, "Finished {}", descriptor.title);
            self.emit(ProvisionEvent::StageCompleted {
                stage_index: stage,
                title: descriptor.title,
            });
        }

        self.settle_scheduled = true;
        let signals = self.signal_tx.clone();
        self.throttle.schedule_after(
            self.throttle.stage_settle_delay(),
            self.token.clone(),
            async move {
                let _ = signals.send(Signal::SettleElapsed { stage });
            },
        );
    }

    fn advance(&mut self) {
        if !self.state.advance() {
            return;
        }
        self.items.clear();
        self.settle_scheduled = false;

        if self.state.is_complete() {
            self.finish();
        } else {
            self.dispatch_stage();
        }
    }

    fn finish(&mut self) {
        info!(run_id = %self.run_id, "Provisioning complete");
        self.token.cancel();
        self.emit(ProvisionEvent::RunCompleted {
            run_id: self.run_id,
        });
    }

    fn abort(&mut self) {
        if self.aborted {
            return;
        }
        self.aborted = true;
        self.token.cancel();
        info!(run_id = %self.run_id, stage = self.state.stage_index(), "Run aborted");
        self.emit(ProvisionEvent::RunAborted {
            run_id: self.run_id,
            stage_index: self.state.stage_index(),
        });
    }

    /// Apply an operator command; the new snapshot is published before the
    /// reply is sent
    fn on_command(&mut self, command: Command) {
        match command {
            Command::ClearError { reply } => {
                let cleared = self.clear_error();
                self.publish();
                let _ = reply.send(cleared);
            }
            Command::RetryFailed { reply } => {
                let result = self.retry_failed();
                self.publish();
                let _ = reply.send(result);
            }
            Command::Abort { reply } => {
                self.abort();
                self.publish();
                let _ = reply.send(());
            }
        }
    }

    fn clear_error(&mut self) -> bool {
        if !self.state.clear_error() {
            return false;
        }
        let stage = self.state.stage_index();
        info!(stage, "Error cleared");
        self.emit(ProvisionEvent::ErrorCleared { stage_index: stage });
        true
    }

    fn retry_failed(&mut self) -> Result<usize, ProvisionError> {
        if let Some(error) = self.state.last_error() {
            return Err(ProvisionError::Halted(error.to_string()));
        }

        let failed: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, work)| work.status == ItemStatus::Failed)
            .map(|(index, _)| index)
            .collect();

        // Retries queue behind the latest scheduled call
        let start = self
            .last_dispatch_at
            .map(|at| (at + self.throttle.subtask_interval()).saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO);

        for (sequence, &item) in failed.iter().enumerate() {
            let work = &mut self.items[item];
            work.attempt += 1;
            work.status = ItemStatus::Scheduled;
            self.schedule_item(item, start + self.throttle.fan_out_offset(sequence));
        }

        let stage = self.state.stage_index();
        info!(stage, count = failed.len(), "Retrying failed items");
        self.emit(ProvisionEvent::ItemsRetried {
            stage_index: stage,
            count: failed.len(),
        });
        Ok(failed.len())
    }
}
