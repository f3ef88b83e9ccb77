//! The engine task
//!
//! Single owner of the classifier, the recognizer and the mute controller.
//! Volume readings and manual toggles arrive on one channel and are handled
//! one at a time; the recognizer deadline is the only other wakeup.
//!
//! A sequence whose deadline has been reached is expired before the next
//! reading is classified, so a reading that lands exactly on the deadline
//! always starts a new sequence.

use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::events::{MuteEvent, ToggleSource};
use crate::gesture::{ChangeClassifier, DirectionalEvent, GestureRecognizer, Outcome};
use crate::mute::{Actuator, Feedback, MuteController};
use crate::volume::NoReading;

/// Inputs to the engine
#[derive(Debug)]
pub enum Command {
    /// One volume sample, in observation order
    Reading(Result<u8, NoReading>),
    /// Manual toggle. The reply carries the mute state in effect afterwards.
    Toggle {
        source: ToggleSource,
        reply: Option<oneshot::Sender<bool>>,
    },
}

/// Gesture recognition and mute control behind one event loop
pub struct Engine<A, F> {
    classifier: ChangeClassifier,
    recognizer: GestureRecognizer,
    controller: MuteController<A, F>,
    event_tx: broadcast::Sender<MuteEvent>,
    gestures_detected: u64,
}

impl<A: Actuator, F: Feedback> Engine<A, F> {
    pub fn new(
        recognizer: GestureRecognizer,
        controller: MuteController<A, F>,
        event_tx: broadcast::Sender<MuteEvent>,
    ) -> Self {
        Self {
            classifier: ChangeClassifier::new(),
            recognizer,
            controller,
            event_tx,
            gestures_detected: 0,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.controller.is_muted()
    }

    /// Run until the command channel closes.
    ///
    /// Dropping the returned future cancels any pending deadline; nothing
    /// reaches the controller afterwards.
    pub async fn run(&mut self, mut command_rx: mpsc::Receiver<Command>) {
        info!(
            window_ms = self.recognizer.window().as_millis() as u64,
            "engine started in Idle state"
        );
        self.controller.refresh();

        loop {
            let deadline = self.recognizer.deadline();

            tokio::select! {
                biased;

                _ = wait_until(deadline) => {
                    self.handle_deadline();
                }

                command = command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        self.recognizer.reset();
        info!(gestures = self.gestures_detected, "engine stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Reading(reading) => {
                let now = now();
                if self.recognizer.on_deadline(now) {
                    debug!("gesture window elapsed before reading");
                }
                if let Some(event) = self.classifier.observe(reading, now) {
                    self.handle_direction(event).await;
                }
            }
            Command::Toggle { source, reply } => {
                let muted = self.toggle(source).await;
                if let Some(reply) = reply {
                    let _ = reply.send(muted);
                }
            }
        }
    }

    async fn handle_direction(&mut self, event: DirectionalEvent) {
        debug!(kind = %event.kind, state = %self.recognizer.state(), "volume changed");

        match self.recognizer.on_event(event) {
            Outcome::Detected => {
                self.gestures_detected += 1;
                info!(count = self.gestures_detected, "gesture detected");
                self.emit(MuteEvent::GestureDetected);
                self.toggle(ToggleSource::Gesture).await;
            }
            outcome => {
                debug!(?outcome, state = %self.recognizer.state(), "gesture pending");
            }
        }
    }

    fn handle_deadline(&mut self) {
        if self.recognizer.on_deadline(now()) {
            debug!("gesture window elapsed");
        }
    }

    /// The single toggle path for gestures and manual triggers
    async fn toggle(&mut self, source: ToggleSource) -> bool {
        let requested = !self.controller.is_muted();

        match self.controller.toggle().await {
            Ok(muted) => {
                info!(muted, %source, "mute toggled");
                self.emit(MuteEvent::MuteChanged { muted, source });
                muted
            }
            Err(e) => {
                self.emit(MuteEvent::ActuationFailed {
                    requested,
                    reason: e.to_string(),
                });
                self.controller.is_muted()
            }
        }
    }

    fn emit(&self, event: MuteEvent) {
        debug!(%event, "emitting event");
        let _ = self.event_tx.send(event);
    }
}

/// Current time on the runtime clock (follows a paused clock in tests)
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;
    use crate::mute::doubles::{FeedbackCall, RecordingActuator, RecordingFeedback, SlowActuator};

    const WINDOW: Duration = Duration::from_millis(1500);

    type TestEngine = Engine<RecordingActuator, RecordingFeedback>;

    fn create_engine() -> (TestEngine, RecordingActuator, broadcast::Receiver<MuteEvent>) {
        let (tx, rx) = broadcast::channel(16);
        let actuator = RecordingActuator::default();
        let controller = MuteController::new(actuator.clone(), RecordingFeedback::default());
        let engine = Engine::new(GestureRecognizer::new(WINDOW), controller, tx);
        (engine, actuator, rx)
    }

    async fn read(engine: &mut TestEngine, level: u8) {
        engine.handle_command(Command::Reading(Ok(level))).await;
    }

    async fn toggle_and_wait(command_tx: &mpsc::Sender<Command>, source: ToggleSource) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        command_tx
            .send(Command::Toggle {
                source,
                reply: Some(reply_tx),
            })
            .await
            .unwrap();
        reply_rx.await.unwrap()
    }

    fn drain(rx: &mut broadcast::Receiver<MuteEvent>) -> Vec<MuteEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_up_down_readings_toggle_once() {
        let (mut engine, actuator, mut rx) = create_engine();

        read(&mut engine, 50).await;
        read(&mut engine, 60).await;
        tokio::time::advance(Duration::from_millis(300)).await;
        read(&mut engine, 40).await;

        assert!(engine.is_muted());
        assert_eq!(*actuator.applied.lock().unwrap(), vec![true]);
        assert_eq!(
            drain(&mut rx),
            vec![
                MuteEvent::GestureDetected,
                MuteEvent::MuteChanged {
                    muted: true,
                    source: ToggleSource::Gesture
                },
            ]
        );
        assert!(engine.recognizer.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_timestamps() {
        let (mut engine, _, _) = create_engine();

        // Readings [50, 60, 40] at [0.0, 0.3, 0.9]s
        read(&mut engine, 50).await;
        tokio::time::advance(Duration::from_millis(300)).await;
        read(&mut engine, 60).await;
        tokio::time::advance(Duration::from_millis(600)).await;
        read(&mut engine, 40).await;

        assert!(engine.is_muted());
        assert_eq!(engine.gestures_detected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_down_up_readings_ignored() {
        let (mut engine, actuator, mut rx) = create_engine();

        read(&mut engine, 50).await;
        read(&mut engine, 40).await;
        read(&mut engine, 60).await;

        assert!(!engine.is_muted());
        assert!(actuator.applied.lock().unwrap().is_empty());
        assert!(drain(&mut rx).is_empty());
        assert!(engine.recognizer.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reading_between_samples() {
        let (mut engine, _, _) = create_engine();

        read(&mut engine, 50).await;
        read(&mut engine, 60).await;
        engine
            .handle_command(Command::Reading(Err(NoReading::Unparsable)))
            .await;
        assert!(engine.recognizer.deadline().is_some());
        read(&mut engine, 40).await;

        assert!(engine.is_muted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_readings_do_not_count() {
        let (mut engine, _, _) = create_engine();

        read(&mut engine, 50).await;
        read(&mut engine, 60).await;
        read(&mut engine, 60).await;
        read(&mut engine, 40).await;

        assert!(engine.is_muted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_event_expires() {
        let (mut engine, _, mut rx) = create_engine();

        read(&mut engine, 50).await;
        read(&mut engine, 60).await;
        tokio::time::advance(WINDOW).await;
        engine.handle_deadline();

        assert!(engine.recognizer.deadline().is_none());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_second_event_starts_fresh() {
        let (mut engine, _, _) = create_engine();

        read(&mut engine, 50).await;
        read(&mut engine, 60).await;
        tokio::time::advance(WINDOW + Duration::from_millis(1)).await;
        read(&mut engine, 40).await;

        assert!(!engine.is_muted());
        assert!(engine.recognizer.deadline().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reading_on_deadline_starts_fresh() {
        let (mut engine, actuator, _) = create_engine();

        read(&mut engine, 50).await;
        read(&mut engine, 60).await;
        let first_deadline = engine.recognizer.deadline();
        // No deadline wakeup in between: the reading itself must expire it
        tokio::time::advance(WINDOW).await;
        read(&mut engine, 40).await;

        assert!(!engine.is_muted());
        assert!(actuator.applied.lock().unwrap().is_empty());
        assert_eq!(engine.gestures_detected, 0);
        assert!(engine.recognizer.deadline() > first_deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_and_gesture_share_toggle() {
        let (mut engine, actuator, _) = create_engine();

        let (reply_tx, reply_rx) = oneshot::channel();
        engine
            .handle_command(Command::Toggle {
                source: ToggleSource::Hotkey,
                reply: Some(reply_tx),
            })
            .await;
        assert!(reply_rx.await.unwrap());

        read(&mut engine, 50).await;
        read(&mut engine, 60).await;
        read(&mut engine, 40).await;

        assert!(!engine.is_muted());
        assert_eq!(*actuator.applied.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_toggle_reports_actual_state() {
        let (mut engine, actuator, mut rx) = create_engine();
        *actuator.fail.lock().unwrap() = true;

        let (reply_tx, reply_rx) = oneshot::channel();
        engine
            .handle_command(Command::Toggle {
                source: ToggleSource::Menu,
                reply: Some(reply_tx),
            })
            .await;

        assert!(!reply_rx.await.unwrap());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [MuteEvent::ActuationFailed {
                requested: true,
                ..
            }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_expires_deadline() {
        let (tx, rx) = broadcast::channel(16);
        let actuator = RecordingActuator::default();
        let feedback = RecordingFeedback::default();
        let controller = MuteController::new(actuator.clone(), feedback.clone());
        let mut engine = Engine::new(GestureRecognizer::new(WINDOW), controller, tx);
        drop(rx);

        let (command_tx, command_rx) = mpsc::channel(8);
        let handle = tokio::spawn(async move {
            engine.run(command_rx).await;
            engine
        });

        command_tx.send(Command::Reading(Ok(50))).await.unwrap();
        command_tx.send(Command::Reading(Ok(60))).await.unwrap();
        // Auto-advance lets the engine deadline fire first
        tokio::time::sleep(Duration::from_secs(2)).await;
        command_tx.send(Command::Reading(Ok(40))).await.unwrap();

        assert!(toggle_and_wait(&command_tx, ToggleSource::Menu).await);

        drop(command_tx);
        let engine = handle.await.unwrap();
        assert_eq!(engine.gestures_detected, 0);
        assert_eq!(*actuator.applied.lock().unwrap(), vec![true]);
        assert_eq!(
            feedback.calls.lock().unwrap().first(),
            Some(&FeedbackCall::Icon(false))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_exact_window_starts_fresh() {
        let (tx, _rx) = broadcast::channel(16);
        let actuator = RecordingActuator::default();
        let controller = MuteController::new(actuator.clone(), RecordingFeedback::default());
        let mut engine = Engine::new(GestureRecognizer::new(WINDOW), controller, tx);

        let (command_tx, command_rx) = mpsc::channel(8);
        let handle = tokio::spawn(async move {
            engine.run(command_rx).await;
            engine
        });

        command_tx.send(Command::Reading(Ok(50))).await.unwrap();
        command_tx.send(Command::Reading(Ok(60))).await.unwrap();
        // The reply orders both readings before the clock moves
        assert!(toggle_and_wait(&command_tx, ToggleSource::Menu).await);

        tokio::time::advance(WINDOW).await;
        command_tx.send(Command::Reading(Ok(40))).await.unwrap();
        assert!(!toggle_and_wait(&command_tx, ToggleSource::Menu).await);

        drop(command_tx);
        let engine = handle.await.unwrap();
        assert_eq!(engine.gestures_detected, 0);
        assert_eq!(*actuator.applied.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_detects_gesture() {
        let (tx, mut rx) = broadcast::channel(16);
        let controller =
            MuteController::new(RecordingActuator::default(), RecordingFeedback::default());
        let mut engine = Engine::new(GestureRecognizer::new(WINDOW), controller, tx);

        let (command_tx, command_rx) = mpsc::channel(8);
        let handle = tokio::spawn(async move { engine.run(command_rx).await });

        for level in [50, 60, 40] {
            command_tx.send(Command::Reading(Ok(level))).await.unwrap();
        }

        assert_eq!(rx.recv().await.unwrap(), MuteEvent::GestureDetected);
        assert!(matches!(
            rx.recv().await.unwrap(),
            MuteEvent::MuteChanged { muted: true, .. }
        ));

        drop(command_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_actuation_does_not_stall_sibling_tasks() {
        let (tx, _rx) = broadcast::channel(16);
        let controller = MuteController::new(
            SlowActuator {
                delay: Duration::from_millis(300),
            },
            RecordingFeedback::default(),
        );
        let mut engine = Engine::new(GestureRecognizer::new(WINDOW), controller, tx);
        let (command_tx, command_rx) = mpsc::channel(8);

        // Shares the current-thread runtime with the engine, like the main select
        let mut max_gap = Duration::ZERO;
        let ticker = async {
            let mut last = std::time::Instant::now();
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                max_gap = max_gap.max(last.elapsed());
                last = std::time::Instant::now();
            }
        };

        let muted = tokio::select! {
            _ = engine.run(command_rx) => panic!("engine stopped early"),
            _ = ticker => unreachable!(),
            muted = toggle_and_wait(&command_tx, ToggleSource::Hotkey) => muted,
        };

        assert!(muted);
        assert!(
            max_gap < Duration::from_millis(150),
            "sibling task stalled for {:?}",
            max_gap
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_without_deadline_stays_pending() {
        let mut idle = task::spawn(wait_until(None));
        assert_pending!(idle.poll());

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_pending!(idle.poll());

        let mut armed = task::spawn(wait_until(Some(now() + WINDOW)));
        assert_pending!(armed.poll());
        tokio::time::advance(WINDOW).await;
        assert_ready!(armed.poll());
    }
}
