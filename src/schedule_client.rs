//! Sources of modulation schedules: the remote generation service, plus a
//! file-backed source for offline playback of a stored schedule.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ModulationSchedule, SessionStartData, SessionStartRequest, SessionStartResponse};

/// Produces a schedule for an intent and session length. Implementations are
/// called from a worker thread; the session machine only ever sees the
/// result as an event.
pub trait ScheduleSource: Send + Sync {
    fn fetch(&self, intent: &str, duration_minutes: u32) -> Result<SessionStartData>;
}

/// Client for the schedule-generation service.
pub struct HttpScheduleClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpScheduleClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ScheduleRequest(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

impl ScheduleSource for HttpScheduleClient {
    fn fetch(&self, intent: &str, duration_minutes: u32) -> Result<SessionStartData> {
        let url = format!("{}/sessions/start", self.base_url);
        debug!(%url, intent, duration_minutes, "requesting schedule");

        let response = self
            .http
            .post(&url)
            .json(&SessionStartRequest {
                intent: intent.to_string(),
                duration_minutes,
            })
            .send()
            .map_err(|e| Error::ScheduleRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ScheduleRequest(format!(
                "API error: {}",
                status.as_u16()
            )));
        }

        let body: SessionStartResponse = response
            .json()
            .map_err(|e| Error::ScheduleRequest(e.to_string()))?;
        if !body.success {
            return Err(Error::ScheduleRequest(body.message));
        }
        Ok(body.data)
    }
}

/// Reads a `ModulationSchedule` from a local JSON file, feeding it through
/// the same session path as a service response.
pub struct FileScheduleSource {
    path: PathBuf,
}

impl FileScheduleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScheduleSource for FileScheduleSource {
    fn fetch(&self, _intent: &str, _duration_minutes: u32) -> Result<SessionStartData> {
        let text = std::fs::read_to_string(&self.path)?;
        let schedule: ModulationSchedule =
            serde_json::from_str(&text).map_err(|e| Error::MalformedSchedule(e.to_string()))?;
        Ok(SessionStartData {
            session_id: 0,
            schedule,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{FileScheduleSource, ScheduleSource};

    #[test]
    fn file_source_loads_a_schedule() {
        let dir = std::env::temp_dir().join("binaural_backend_file_source_test");
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("schedule.json");
        std::fs::write(
            &path,
            r#"{
                "intent": "Deep Focus - Coding",
                "total_duration_sec": 600,
                "steps": [
                    {"timestamp_sec": 0, "target_bpm": 70, "binaural_freq": 8.0, "ramp_duration_sec": 0},
                    {"timestamp_sec": 300, "target_bpm": 60, "binaural_freq": 4.0, "ramp_duration_sec": 20}
                ]
            }"#,
        )
        .expect("write schedule");

        let source = FileScheduleSource::new(&path);
        let data = source.fetch("ignored", 25).expect("schedule loads");
        assert_eq!(data.session_id, 0);
        assert_eq!(data.schedule.steps.len(), 2);
        assert!(data.schedule.validate().is_ok());
    }

    #[test]
    fn file_source_rejects_invalid_json() {
        let dir = std::env::temp_dir().join("binaural_backend_file_source_test");
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("broken.json");
        std::fs::write(&path, "{not json").expect("write file");

        let source = FileScheduleSource::new(&path);
        assert!(source.fetch("ignored", 25).is_err());
    }
}
