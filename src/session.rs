//! Session lifecycle: idle -> loading -> playing -> idle, driven by a queue
//! of discrete events consumed on a single thread.
//!
//! The machine owns the audio engine and the elapsed-time clock. Elapsed
//! time is derived from the wall clock captured at session start, not an
//! incrementing counter, so missed or late ticks self-correct instead of
//! accumulating drift.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{never, tick, Receiver, Sender};
use crossbeam::select;
use tracing::{debug, info, warn};

use crate::engine::BeatEngine;
use crate::models::ModulationSchedule;
use crate::schedule_client::ScheduleSource;
use crate::scheduler;

/// Period of the elapsed-time clock.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Loading,
    Playing,
}

/// Observable session record. A failed attempt rests at `Idle` with `error`
/// carrying the user-visible message.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub status: SessionStatus,
    pub intent: String,
    pub schedule: Option<ModulationSchedule>,
    pub current_step: Option<usize>,
    pub elapsed_sec: u64,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

impl SessionState {
    fn new(intent: String) -> Self {
        Self {
            status: SessionStatus::Idle,
            intent,
            schedule: None,
            current_step: None,
            elapsed_sec: 0,
            latency_ms: None,
            error: None,
        }
    }
}

pub enum SessionEvent {
    SetIntent(String),
    Start,
    ScheduleReady {
        generation: u64,
        session_id: i64,
        schedule: ModulationSchedule,
        latency_ms: u64,
    },
    ScheduleFailed {
        generation: u64,
        message: String,
    },
    Tick,
    Stop,
    Shutdown,
}

/// Fetch work the run loop must execute after a `Start` event. The
/// generation ties the eventual response back to the attempt that issued
/// it; responses from a superseded attempt are discarded.
pub struct FetchRequest {
    pub generation: u64,
    pub intent: String,
    pub duration_minutes: u32,
}

pub struct SessionMachine<E: BeatEngine> {
    state: SessionState,
    engine: E,
    carrier_hz: f64,
    duration_minutes: u32,
    generation: u64,
    started_at: Option<Instant>,
}

impl<E: BeatEngine> SessionMachine<E> {
    pub fn new(engine: E, carrier_hz: f64, duration_minutes: u32, intent: String) -> Self {
        Self {
            state: SessionState::new(intent),
            engine,
            carrier_hz,
            duration_minutes,
            generation: 0,
            started_at: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Applies one event. Returns the fetch work a `Start` event produced,
    /// if any; the caller runs it off-thread and posts the result back as a
    /// `ScheduleReady`/`ScheduleFailed` event.
    pub fn handle(&mut self, event: SessionEvent) -> Option<FetchRequest> {
        match event {
            SessionEvent::SetIntent(intent) => {
                self.set_intent(intent);
                None
            }
            SessionEvent::Start => self.begin_start(),
            SessionEvent::ScheduleReady {
                generation,
                session_id,
                schedule,
                latency_ms,
            } => {
                self.on_schedule_ready(generation, session_id, schedule, latency_ms);
                None
            }
            SessionEvent::ScheduleFailed {
                generation,
                message,
            } => {
                self.on_schedule_failed(generation, message);
                None
            }
            SessionEvent::Tick => {
                self.on_tick();
                None
            }
            SessionEvent::Stop => {
                self.stop();
                None
            }
            SessionEvent::Shutdown => {
                self.shutdown();
                None
            }
        }
    }

    /// Intent is user-mutable only while idle.
    pub fn set_intent(&mut self, intent: String) {
        if self.state.status == SessionStatus::Idle {
            self.state.intent = intent;
        } else {
            debug!("intent change ignored outside idle");
        }
    }

    /// Idle -> Loading. The returned request must be fetched and answered
    /// with a response event carrying the same generation.
    pub fn begin_start(&mut self) -> Option<FetchRequest> {
        if self.state.status != SessionStatus::Idle {
            warn!(status = ?self.state.status, "start ignored");
            return None;
        }
        self.generation += 1;
        self.state.status = SessionStatus::Loading;
        self.state.error = None;
        info!(intent = %self.state.intent, minutes = self.duration_minutes, "requesting schedule");
        Some(FetchRequest {
            generation: self.generation,
            intent: self.state.intent.clone(),
            duration_minutes: self.duration_minutes,
        })
    }

    pub fn on_schedule_ready(
        &mut self,
        generation: u64,
        session_id: i64,
        schedule: ModulationSchedule,
        latency_ms: u64,
    ) {
        if self.is_stale(generation) {
            debug!("discarding stale schedule response");
            return;
        }
        if let Err(e) = schedule.validate() {
            self.fail(e.to_string());
            return;
        }
        // validate() guarantees at least one step at timestamp 0.
        let first_beat = schedule.steps[0].binaural_freq;
        if let Err(e) = self.engine.start(self.carrier_hz, first_beat, 0.0) {
            self.fail(e.to_string());
            return;
        }
        info!(
            session_id,
            latency_ms,
            steps = schedule.steps.len(),
            total_sec = schedule.total_duration_sec,
            "session playing"
        );
        self.state.status = SessionStatus::Playing;
        self.state.schedule = Some(schedule);
        self.state.current_step = Some(0);
        self.state.elapsed_sec = 0;
        self.state.latency_ms = Some(latency_ms);
        self.started_at = Some(Instant::now());
    }

    pub fn on_schedule_failed(&mut self, generation: u64, message: String) {
        if self.is_stale(generation) {
            debug!("discarding stale schedule failure");
            return;
        }
        self.fail(message);
    }

    /// A response is stale once the session has been stopped or restarted
    /// since the request was issued.
    fn is_stale(&self, generation: u64) -> bool {
        generation != self.generation || self.state.status != SessionStatus::Loading
    }

    fn fail(&mut self, message: String) {
        warn!(%message, "session attempt failed");
        self.state.status = SessionStatus::Idle;
        self.state.error = Some(message);
        self.state.schedule = None;
        self.state.current_step = None;
        self.state.elapsed_sec = 0;
        self.started_at = None;
    }

    pub fn on_tick(&mut self) {
        let Some(started_at) = self.started_at else {
            return;
        };
        self.apply_elapsed(started_at.elapsed().as_secs());
    }

    /// Advances the session to an elapsed-time sample. Step transitions are
    /// applied in index order and each fires exactly once, no matter how
    /// many samples land inside one step's window.
    pub fn apply_elapsed(&mut self, elapsed_sec: u64) {
        if self.state.status != SessionStatus::Playing {
            return;
        }
        self.state.elapsed_sec = elapsed_sec;
        let Some(schedule) = self.state.schedule.as_ref() else {
            return;
        };

        let transition = match scheduler::resolve(
            &schedule.steps,
            elapsed_sec as f64,
            self.state.current_step,
        ) {
            Ok(res) if res.changed => {
                let step = &schedule.steps[res.index];
                Some((res.index, step.binaural_freq, step.ramp_duration_sec))
            }
            Ok(_) => None,
            Err(e) => {
                warn!("scheduler: {e}");
                None
            }
        };

        if let Some((index, binaural_freq, ramp_sec)) = transition {
            info!(index, binaural_freq, ramp_sec, elapsed_sec, "step transition");
            self.engine.retarget(self.carrier_hz, binaural_freq, ramp_sec);
            self.state.current_step = Some(index);
        }
    }

    /// Tears the session down to idle: audio released, clock cancelled,
    /// schedule discarded, any in-flight schedule response orphaned.
    pub fn stop(&mut self) {
        self.engine.stop();
        self.generation += 1;
        if self.state.status != SessionStatus::Idle {
            info!("session stopped");
        }
        self.state.status = SessionStatus::Idle;
        self.state.schedule = None;
        self.state.current_step = None;
        self.state.elapsed_sec = 0;
        self.started_at = None;
    }

    /// Unconditional cleanup path; identical to `stop` from every state.
    pub fn shutdown(&mut self) {
        self.stop();
    }
}

/// Drives a session machine over an event channel until shutdown, or until
/// a started attempt has come back to rest at idle. Returns the final state.
///
/// The ticker exists only while playing; stopping replaces it with a channel
/// that never fires, cancelling the clock on the same tick.
pub fn run_session<E: BeatEngine>(
    mut machine: SessionMachine<E>,
    source: Arc<dyn ScheduleSource>,
    events_rx: Receiver<SessionEvent>,
    events_tx: Sender<SessionEvent>,
) -> SessionState {
    let mut ticker = never();
    let mut was_playing = false;
    let mut attempted = false;

    loop {
        let event = select! {
            recv(events_rx) -> event => match event {
                Ok(event) => event,
                Err(_) => SessionEvent::Shutdown,
            },
            recv(ticker) -> _ => SessionEvent::Tick,
        };
        let is_shutdown = matches!(event, SessionEvent::Shutdown);

        if let Some(request) = machine.handle(event) {
            attempted = true;
            spawn_fetch(source.clone(), request, events_tx.clone());
        }

        let playing = machine.state().status == SessionStatus::Playing;
        if playing != was_playing {
            ticker = if playing { tick(TICK_INTERVAL) } else { never() };
            was_playing = playing;
        }

        if is_shutdown {
            break;
        }
        if attempted && machine.state().status == SessionStatus::Idle {
            break;
        }
    }
    machine.state().clone()
}

/// Runs the schedule request on a worker thread, measuring round-trip
/// latency and posting the outcome back onto the event queue.
fn spawn_fetch(
    source: Arc<dyn ScheduleSource>,
    request: FetchRequest,
    events_tx: Sender<SessionEvent>,
) {
    std::thread::spawn(move || {
        let started = Instant::now();
        let result = source.fetch(&request.intent, request.duration_minutes);
        let latency_ms = started.elapsed().as_millis() as u64;
        let event = match result {
            Ok(data) => SessionEvent::ScheduleReady {
                generation: request.generation,
                session_id: data.session_id,
                schedule: data.schedule,
                latency_ms,
            },
            Err(e) => SessionEvent::ScheduleFailed {
                generation: request.generation,
                message: e.to_string(),
            },
        };
        // The receiver may already be gone after a shutdown.
        let _ = events_tx.send(event);
    });
}
