//! Session supervisor behavior against a scripted speech capability.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use voxnav_commands::testing::{HostCall, RecordingDocument};
use voxnav_commands::{ActionKind, DocumentHost, Grammar};
use voxnav_types::RecognitionConfig;
use voxnav_voice::{
    start_voice_recognition, start_voice_recognition_with_grammar, stop_voice_recognition,
    EventSink, RecognitionResult, Recognizer, SessionHandle, SessionState, SpeechCapability,
    SpeechEvent, VoiceError, VoiceResult, RESTART_DELAY,
};

#[derive(Default)]
struct Script {
    unsupported: bool,
    fail_starts: usize,
    starts: Vec<Instant>,
    sinks: Vec<EventSink>,
    active: usize,
    max_active: usize,
}

#[derive(Clone, Default)]
struct MockSpeech {
    script: Arc<Mutex<Script>>,
}

impl MockSpeech {
    fn unsupported() -> Self {
        let mock = Self::default();
        mock.script.lock().unwrap().unsupported = true;
        mock
    }

    fn fail_next_starts(&self, n: usize) {
        self.script.lock().unwrap().fail_starts = n;
    }

    fn starts(&self) -> Vec<Instant> {
        self.script.lock().unwrap().starts.clone()
    }

    fn max_active(&self) -> usize {
        self.script.lock().unwrap().max_active
    }

    fn active(&self) -> usize {
        self.script.lock().unwrap().active
    }

    fn sink(&self, index: usize) -> EventSink {
        self.script.lock().unwrap().sinks[index].clone()
    }

    fn latest_sink(&self) -> EventSink {
        let script = self.script.lock().unwrap();
        script.sinks.last().cloned().expect("no recognizer started")
    }

    async fn wait_for_starts(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(60), async {
            while self.starts().len() < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("recognizer never started");
    }
}

impl SpeechCapability for MockSpeech {
    fn name(&self) -> &str {
        "mock"
    }

    fn create(&self, _config: &RecognitionConfig) -> VoiceResult<Box<dyn Recognizer>> {
        if self.script.lock().unwrap().unsupported {
            return Err(VoiceError::Unsupported("no engine".into()));
        }
        Ok(Box::new(MockRecognizer {
            script: self.script.clone(),
            active: false,
        }))
    }
}

struct MockRecognizer {
    script: Arc<Mutex<Script>>,
    active: bool,
}

impl Recognizer for MockRecognizer {
    fn start(&mut self, sink: EventSink) -> VoiceResult<()> {
        let mut script = self.script.lock().unwrap();
        if script.fail_starts > 0 {
            script.fail_starts -= 1;
            return Err(VoiceError::StartError("engine busy".into()));
        }
        script.starts.push(Instant::now());
        script.sinks.push(sink);
        script.active += 1;
        script.max_active = script.max_active.max(script.active);
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.script.lock().unwrap().active -= 1;
        }
    }
}

fn said(text: &str) -> SpeechEvent {
    SpeechEvent::Result(vec![RecognitionResult::final_text(text)])
}

fn heard(text: &str) -> SpeechEvent {
    let mut result = RecognitionResult::final_text(text);
    result.is_final = false;
    SpeechEvent::Result(vec![result])
}

fn start(mock: &MockSpeech, host: Arc<RecordingDocument>, config: RecognitionConfig) -> SessionHandle {
    let host: Arc<dyn DocumentHost> = host;
    start_voice_recognition(Arc::new(mock.clone()), host, config).unwrap()
}

async fn wait_for_state(handle: &SessionHandle, state: SessionState) {
    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| *s == state))
        .await
        .expect("state never reached")
        .expect("supervisor exited");
}

#[tokio::test(start_paused = true)]
async fn restart_after_error_waits_for_delay() {
    let mock = MockSpeech::default();
    let handle = start(&mock, Arc::new(RecordingDocument::new()), RecognitionConfig::default());
    wait_for_state(&handle, SessionState::Running).await;

    let failed_at = Instant::now();
    mock.latest_sink().emit(SpeechEvent::Error("network".into()));
    wait_for_state(&handle, SessionState::AwaitingRestart).await;
    mock.wait_for_starts(2).await;

    let starts = mock.starts();
    assert!(starts[1] - failed_at >= RESTART_DELAY);
    assert_eq!(mock.max_active(), 1);
    assert_eq!(handle.state(), SessionState::Running);
    handle.stop_and_wait().await;
}

#[tokio::test(start_paused = true)]
async fn restart_after_natural_end() {
    let mock = MockSpeech::default();
    let handle = start(&mock, Arc::new(RecordingDocument::new()), RecognitionConfig::default());
    wait_for_state(&handle, SessionState::Running).await;

    let ended_at = Instant::now();
    mock.latest_sink().emit(SpeechEvent::End);
    mock.wait_for_starts(2).await;
    assert!(mock.starts()[1] - ended_at >= RESTART_DELAY);

    mock.latest_sink().emit(SpeechEvent::End);
    mock.wait_for_starts(3).await;
    assert_eq!(mock.max_active(), 1);
    handle.stop_and_wait().await;
}

#[tokio::test(start_paused = true)]
async fn error_then_end_schedules_one_restart() {
    let mock = MockSpeech::default();
    let handle = start(&mock, Arc::new(RecordingDocument::new()), RecognitionConfig::default());
    wait_for_state(&handle, SessionState::Running).await;

    let sink = mock.latest_sink();
    sink.emit(SpeechEvent::Error("aborted".into()));
    sink.emit(SpeechEvent::End);
    tokio::time::sleep(RESTART_DELAY * 5).await;

    assert_eq!(mock.starts().len(), 2);
    handle.stop_and_wait().await;
}

#[tokio::test(start_paused = true)]
async fn no_start_after_stop_even_with_pending_restart() {
    let mock = MockSpeech::default();
    let handle = start(&mock, Arc::new(RecordingDocument::new()), RecognitionConfig::default());
    wait_for_state(&handle, SessionState::Running).await;

    mock.latest_sink().emit(SpeechEvent::Error("network".into()));
    wait_for_state(&handle, SessionState::AwaitingRestart).await;

    let state = handle.subscribe();
    stop_voice_recognition(handle);
    tokio::time::sleep(RESTART_DELAY * 5).await;

    assert_eq!(mock.starts().len(), 1);
    assert_eq!(mock.active(), 0);
    assert_eq!(*state.borrow(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn stop_while_running_stops_recognizer() {
    let mock = MockSpeech::default();
    let handle = start(&mock, Arc::new(RecordingDocument::new()), RecognitionConfig::default());
    wait_for_state(&handle, SessionState::Running).await;
    assert!(handle.is_listening());

    handle.stop_and_wait().await;
    assert_eq!(mock.active(), 0);

    // Late signals from the stopped recognizer go nowhere.
    assert!(!mock.latest_sink().emit(SpeechEvent::End));
    tokio::time::sleep(RESTART_DELAY * 3).await;
    assert_eq!(mock.starts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn start_failures_during_restart_keep_retrying() {
    let mock = MockSpeech::default();
    let handle = start(&mock, Arc::new(RecordingDocument::new()), RecognitionConfig::default());
    wait_for_state(&handle, SessionState::Running).await;

    mock.fail_next_starts(2);
    let failed_at = Instant::now();
    mock.latest_sink().emit(SpeechEvent::Error("network".into()));
    mock.wait_for_starts(2).await;

    assert!(mock.starts()[1] - failed_at >= RESTART_DELAY * 3);
    assert_eq!(mock.max_active(), 1);
    handle.stop_and_wait().await;
}

#[tokio::test(start_paused = true)]
async fn unsupported_capability_fails_fast() {
    let host: Arc<dyn DocumentHost> = Arc::new(RecordingDocument::new());
    let result = start_voice_recognition(
        Arc::new(MockSpeech::unsupported()),
        host,
        RecognitionConfig::default(),
    );
    assert!(matches!(result, Err(VoiceError::Unsupported(_))));
}

#[tokio::test(start_paused = true)]
async fn invalid_config_is_rejected() {
    let host: Arc<dyn DocumentHost> = Arc::new(RecordingDocument::new());
    let config = RecognitionConfig {
        scroll_amount: 0,
        ..RecognitionConfig::default()
    };
    let result = start_voice_recognition(Arc::new(MockSpeech::default()), host, config);
    assert!(matches!(result, Err(VoiceError::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn auto_start_off_waits_for_start_listening() {
    let mock = MockSpeech::default();
    let config = RecognitionConfig {
        auto_start: false,
        ..RecognitionConfig::default()
    };
    let handle = start(&mock, Arc::new(RecordingDocument::new()), config);

    tokio::time::sleep(RESTART_DELAY * 3).await;
    assert!(mock.starts().is_empty());
    assert_eq!(handle.state(), SessionState::Idle);
    assert!(!handle.is_listening());

    handle.start_listening();
    handle.start_listening();
    wait_for_state(&handle, SessionState::Running).await;
    tokio::time::sleep(RESTART_DELAY).await;
    assert_eq!(mock.starts().len(), 1);
    handle.stop_and_wait().await;
}

#[tokio::test(start_paused = true)]
async fn transcripts_are_dispatched_in_order() {
    let mock = MockSpeech::default();
    let host = Arc::new(RecordingDocument::new());
    let handle = start(&mock, host.clone(), RecognitionConfig::default());
    wait_for_state(&handle, SessionState::Running).await;

    let sink = mock.latest_sink();
    sink.emit(said("  Scroll Down "));
    sink.emit(said("navigate to example.com"));
    sink.emit(said("sing a song"));
    sink.emit(said("back"));
    handle.stop_and_wait().await;

    assert_eq!(
        host.calls(),
        vec![
            HostCall::ScrollBy(500),
            HostCall::Navigate("https://example.com".into()),
            HostCall::Back,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn only_latest_final_result_is_dispatched() {
    let mock = MockSpeech::default();
    let host = Arc::new(RecordingDocument::new());
    let handle = start(&mock, host.clone(), RecognitionConfig::default());
    wait_for_state(&handle, SessionState::Running).await;

    let sink = mock.latest_sink();
    sink.emit(SpeechEvent::Result(vec![
        RecognitionResult::final_text("back"),
        RecognitionResult::final_text("forward"),
    ]));
    let mut interim = RecognitionResult::final_text("refresh page");
    interim.is_final = false;
    sink.emit(SpeechEvent::Result(vec![interim]));
    handle.stop_and_wait().await;

    assert_eq!(host.calls(), vec![HostCall::Forward]);
}

#[tokio::test(start_paused = true)]
async fn events_from_superseded_recognizer_are_ignored() {
    let mock = MockSpeech::default();
    let host = Arc::new(RecordingDocument::new());
    let handle = start(&mock, host.clone(), RecognitionConfig::default());
    wait_for_state(&handle, SessionState::Running).await;

    mock.sink(0).emit(SpeechEvent::Error("network".into()));
    mock.wait_for_starts(2).await;

    mock.sink(0).emit(said("refresh page"));
    mock.sink(0).emit(SpeechEvent::End);
    mock.sink(1).emit(said("scroll up"));
    tokio::time::sleep(RESTART_DELAY * 3).await;

    assert_eq!(mock.starts().len(), 2);
    handle.stop_and_wait().await;
    assert_eq!(host.calls(), vec![HostCall::ScrollBy(-500)]);
}

#[tokio::test(start_paused = true)]
async fn missing_element_does_not_disturb_session() {
    let mock = MockSpeech::default();
    let host = Arc::new(RecordingDocument::new());
    let handle = start(&mock, host.clone(), RecognitionConfig::default());
    wait_for_state(&handle, SessionState::Running).await;

    let sink = mock.latest_sink();
    sink.emit(said("click on submit-button"));
    sink.emit(said("refresh page"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(handle.state(), SessionState::Running);
    assert_eq!(mock.starts().len(), 1);
    handle.stop_and_wait().await;
    assert_eq!(host.mutations(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_stops_session() {
    let mock = MockSpeech::default();
    let handle = start(&mock, Arc::new(RecordingDocument::new()), RecognitionConfig::default());
    wait_for_state(&handle, SessionState::Running).await;
    let state = handle.subscribe();

    drop(handle);
    tokio::time::sleep(RESTART_DELAY * 2).await;

    assert_eq!(mock.active(), 0);
    assert_eq!(*state.borrow(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn interim_results_dispatch_when_enabled() {
    let mock = MockSpeech::default();
    let host = Arc::new(RecordingDocument::new());
    let config = RecognitionConfig {
        interim_results: true,
        ..RecognitionConfig::default()
    };
    let handle = start(&mock, host.clone(), config);
    wait_for_state(&handle, SessionState::Running).await;

    let sink = mock.latest_sink();
    sink.emit(heard("scroll down"));
    sink.emit(said("back"));
    handle.stop_and_wait().await;

    assert_eq!(host.calls(), vec![HostCall::ScrollBy(500), HostCall::Back]);
}

#[tokio::test(start_paused = true)]
async fn interim_results_skipped_when_disabled() {
    let mock = MockSpeech::default();
    let host = Arc::new(RecordingDocument::new());
    let config = RecognitionConfig {
        interim_results: false,
        ..RecognitionConfig::default()
    };
    let handle = start(&mock, host.clone(), config);
    wait_for_state(&handle, SessionState::Running).await;

    let sink = mock.latest_sink();
    sink.emit(heard("scroll down"));
    sink.emit(said("back"));
    handle.stop_and_wait().await;

    assert_eq!(host.calls(), vec![HostCall::Back]);
}

#[tokio::test(start_paused = true)]
async fn custom_grammar_drives_dispatch() {
    let mock = MockSpeech::default();
    let host = Arc::new(RecordingDocument::new());
    let grammar = Grammar::new([
        ("go down", ActionKind::ScrollDown),
        ("open", ActionKind::NavigateTo),
    ])
    .unwrap();
    let dyn_host: Arc<dyn DocumentHost> = host.clone();
    let handle = start_voice_recognition_with_grammar(
        Arc::new(mock.clone()),
        dyn_host,
        RecognitionConfig::default(),
        grammar,
    )
    .unwrap();
    wait_for_state(&handle, SessionState::Running).await;

    let sink = mock.latest_sink();
    sink.emit(said("Go Down"));
    sink.emit(said("open example.org"));
    sink.emit(said("scroll down"));
    handle.stop_and_wait().await;

    assert_eq!(
        host.calls(),
        vec![
            HostCall::ScrollBy(500),
            HostCall::Navigate("https://example.org".into()),
        ]
    );
}
