//! Recognition session supervisor.
//!
//! One tokio task owns the session state. Speech events, restart timers, and
//! control requests all arrive on a single queue and are handled in order, so
//! at most one recognizer is ever active.
//!
//! ```text
//! Idle ─▶ Starting ─▶ Running ─┬─▶ Stopping ─▶ Idle
//!             ▲                └─▶ AwaitingRestart ─┐
//!             └─────────────── (RESTART_DELAY) ─────┘
//! ```
//!
//! A restart is a detached sleep that posts `RestartDue` back into the queue.
//! Stopping does not cancel it; it is a no-op once it fires.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use voxnav_commands::{Dispatcher, DocumentHost, Grammar};
use voxnav_types::RecognitionConfig;

use crate::capability::{EventSink, Recognizer, SpeechCapability, SpeechEvent};
use crate::{VoiceError, VoiceResult};

/// Fixed delay between a session ending and the next start attempt.
pub const RESTART_DELAY: Duration = Duration::from_millis(1000);

/// Lifecycle state of a recognition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    AwaitingRestart,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::AwaitingRestart => "awaiting_restart",
        };
        f.write_str(s)
    }
}

enum Msg {
    Start,
    Speech { generation: u64, event: SpeechEvent },
    RestartDue,
    Stop,
}

/// Owned handle to a running supervisor.
///
/// Dropping the handle stops the session.
pub struct SessionHandle {
    intent: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Msg>,
    state_rx: watch::Receiver<SessionState>,
    task: Option<JoinHandle<()>>,
    stopped: bool,
}

impl SessionHandle {
    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Whether the caller currently wants the session listening.
    pub fn is_listening(&self) -> bool {
        self.intent.load(Ordering::SeqCst)
    }

    /// Activate a session created with `auto_start = false`. No effect if
    /// already listening.
    pub fn start_listening(&self) {
        if !self.intent.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(Msg::Start);
        }
    }

    /// Stop listening. Returns without waiting for the recognizer.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Stop listening and wait until every queued event has been handled.
    pub async fn stop_and_wait(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "recognition supervisor task failed");
            }
        }
    }

    fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.intent.store(false, Ordering::SeqCst);
        let _ = self.tx.send(Msg::Stop);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.state())
            .field("listening", &self.is_listening())
            .finish()
    }
}

/// Start supervised continuous recognition.
///
/// Every transcript is parsed and dispatched against `host`. The first
/// recognizer is created before this returns, so an unsupported platform
/// fails here with [`VoiceError::Unsupported`]. With `config.auto_start`
/// unset the session stays [`SessionState::Idle`] until
/// [`SessionHandle::start_listening`].
///
/// Interim results are dispatched only when `config.interim_results` is set.
///
/// Must be called from within a tokio runtime.
pub fn start_voice_recognition(
    capability: Arc<dyn SpeechCapability>,
    host: Arc<dyn DocumentHost>,
    config: RecognitionConfig,
) -> VoiceResult<SessionHandle> {
    start_voice_recognition_with_grammar(capability, host, config, Grammar::builtin())
}

/// [`start_voice_recognition`] with transcripts parsed against `grammar`
/// instead of the built-in one.
pub fn start_voice_recognition_with_grammar(
    capability: Arc<dyn SpeechCapability>,
    host: Arc<dyn DocumentHost>,
    config: RecognitionConfig,
    grammar: Grammar,
) -> VoiceResult<SessionHandle> {
    config.validate()?;
    let runtime =
        tokio::runtime::Handle::try_current().map_err(|e| VoiceError::Runtime(e.to_string()))?;

    let prepared = capability.create(&config)?;

    let intent = Arc::new(AtomicBool::new(config.auto_start));
    let (tx, rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(SessionState::Idle);

    tracing::info!(
        engine = capability.name(),
        host = host.name(),
        language = %config.language,
        auto_start = config.auto_start,
        rules = grammar.rules().len(),
        "voice recognition initialized"
    );

    let supervisor = Supervisor {
        dispatcher: Dispatcher::new(host, &config).with_grammar(grammar),
        capability,
        config,
        intent: intent.clone(),
        state_tx,
        tx: tx.clone(),
        prepared: Some(prepared),
        recognizer: None,
        generation: 0,
        running: false,
        restart_pending: false,
    };
    let task = runtime.spawn(supervisor.run(rx));

    Ok(SessionHandle {
        intent,
        tx,
        state_rx,
        task: Some(task),
        stopped: false,
    })
}

/// Stop a session started with [`start_voice_recognition`].
pub fn stop_voice_recognition(handle: SessionHandle) {
    handle.stop();
}

struct Supervisor {
    capability: Arc<dyn SpeechCapability>,
    config: RecognitionConfig,
    dispatcher: Dispatcher,
    intent: Arc<AtomicBool>,
    state_tx: watch::Sender<SessionState>,
    tx: mpsc::UnboundedSender<Msg>,
    /// Created eagerly at start-up; used by the first activation.
    prepared: Option<Box<dyn Recognizer>>,
    recognizer: Option<Box<dyn Recognizer>>,
    generation: u64,
    running: bool,
    restart_pending: bool,
}

impl Supervisor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Msg>) {
        if self.wants_session() {
            self.begin_session();
        }

        while let Some(msg) = rx.recv().await {
            match msg {
                Msg::Start => self.on_start(),
                Msg::Speech { generation, event } => self.on_speech(generation, event).await,
                Msg::RestartDue => self.on_restart_due(),
                Msg::Stop => {
                    self.on_stop();
                    break;
                }
            }
        }
    }

    fn wants_session(&self) -> bool {
        self.intent.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "session state changed");
        }
    }

    fn on_start(&mut self) {
        if self.running || self.restart_pending || !self.wants_session() {
            return;
        }
        self.begin_session();
    }

    fn begin_session(&mut self) {
        self.set_state(SessionState::Starting);

        let mut recognizer = match self.prepared.take() {
            Some(recognizer) => recognizer,
            None => match self.capability.create(&self.config) {
                Ok(recognizer) => recognizer,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to create recognizer");
                    self.schedule_restart();
                    return;
                }
            },
        };

        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();
        let sink = EventSink::new(move |event| tx.send(Msg::Speech { generation, event }).is_ok());

        match recognizer.start(sink) {
            Ok(()) => {
                self.running = true;
                self.recognizer = Some(recognizer);
                self.set_state(SessionState::Running);
                tracing::info!(generation, "recognition session started");
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "recognizer failed to start");
                recognizer.stop();
                self.generation += 1;
                self.schedule_restart();
            }
        }
    }

    async fn on_speech(&mut self, generation: u64, event: SpeechEvent) {
        if generation != self.generation || !self.running {
            tracing::debug!(
                generation,
                current = self.generation,
                "ignoring event from superseded recognizer"
            );
            return;
        }

        match event {
            SpeechEvent::Result(ref results) => {
                let interim = results.last().is_some_and(|r| !r.is_final);
                if interim && !self.config.interim_results {
                    return;
                }
                let Some(transcript) = event.transcript() else {
                    return;
                };
                let dispatch = self.dispatcher.dispatch(&transcript).await;
                tracing::info!(
                    transcript = %transcript,
                    command = %dispatch.command.kind,
                    argument = %dispatch.command.argument,
                    outcome = ?dispatch.outcome,
                    "voice command"
                );
            }
            SpeechEvent::End => {
                tracing::debug!(generation, "recognition session ended");
                self.end_session();
            }
            SpeechEvent::Error(reason) => {
                tracing::debug!(generation, reason = %reason, "recognition session failed");
                self.end_session();
            }
        }
    }

    fn end_session(&mut self) {
        self.running = false;
        if let Some(mut recognizer) = self.recognizer.take() {
            recognizer.stop();
        }
        self.generation += 1;

        if self.wants_session() {
            self.schedule_restart();
        } else {
            self.set_state(SessionState::Idle);
        }
    }

    fn schedule_restart(&mut self) {
        self.set_state(SessionState::AwaitingRestart);
        if self.restart_pending {
            return;
        }
        self.restart_pending = true;

        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RESTART_DELAY).await;
            let _ = tx.send(Msg::RestartDue);
        });
        tracing::debug!(delay_ms = RESTART_DELAY.as_millis() as u64, "restart scheduled");
    }

    fn on_restart_due(&mut self) {
        self.restart_pending = false;
        if !self.wants_session() {
            tracing::debug!("restart skipped: session stopped");
            return;
        }
        if self.running {
            return;
        }
        self.begin_session();
    }

    fn on_stop(&mut self) {
        self.set_state(SessionState::Stopping);
        self.running = false;
        if let Some(mut recognizer) = self.recognizer.take() {
            recognizer.stop();
        }
        self.generation += 1;
        self.set_state(SessionState::Idle);
        tracing::info!("voice recognition stopped");
    }
}
