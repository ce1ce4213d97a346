pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod schedule_client;
pub mod scheduler;
pub mod session;
pub mod voices;

pub use engine::{BeatEngine, BinauralAudioEngine};
pub use error::{Error, Result};
pub use models::{ModulationSchedule, ModulationStep, INTENTS};
pub use session::{run_session, SessionEvent, SessionMachine, SessionState, SessionStatus};
