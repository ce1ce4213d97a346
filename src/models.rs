use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The fixed set of session goals the schedule service understands.
pub const INTENTS: [&str; 5] = [
    "Deep Focus - Coding",
    "Deep Focus - Reading",
    "Relaxation - Meditation",
    "Relaxation - Wind Down",
    "Sleep - Deep Rest",
];

fn default_layer() -> String {
    "binaural".to_string()
}

/// One scheduled parameter set, active from its timestamp until the next
/// step's timestamp.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModulationStep {
    /// Seconds from session start at which this step becomes active
    pub timestamp_sec: f64,
    pub target_bpm: f64,
    /// Inter-aural frequency difference in Hz
    pub binaural_freq: f64,
    /// Seconds over which to glide from the previous step's frequency
    pub ramp_duration_sec: f64,
    #[serde(default = "default_layer")]
    pub layer: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModulationSchedule {
    pub intent: String,
    pub total_duration_sec: f64,
    pub steps: Vec<ModulationStep>,
}

impl ModulationSchedule {
    /// Rejects schedules the step scheduler cannot safely consume: the step
    /// sequence must be non-empty, start at time zero, and carry
    /// non-decreasing timestamps. A bad schedule is an error, never repaired,
    /// since reordering here could desynchronize audio from the session.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::MalformedSchedule("schedule has no steps".into()));
        }
        if self.total_duration_sec <= 0.0 {
            return Err(Error::MalformedSchedule(format!(
                "total duration must be positive, got {}",
                self.total_duration_sec
            )));
        }
        let first = self.steps[0].timestamp_sec;
        if first != 0.0 {
            return Err(Error::MalformedSchedule(format!(
                "first step at {first}s, expected 0"
            )));
        }
        for pair in self.steps.windows(2) {
            if pair[1].timestamp_sec < pair[0].timestamp_sec {
                return Err(Error::MalformedSchedule(format!(
                    "step timestamps not sorted: {}s after {}s",
                    pair[1].timestamp_sec, pair[0].timestamp_sec
                )));
            }
        }
        for step in &self.steps {
            if step.ramp_duration_sec < 0.0 {
                return Err(Error::MalformedSchedule(format!(
                    "negative ramp duration at {}s",
                    step.timestamp_sec
                )));
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct SessionStartRequest {
    pub intent: String,
    pub duration_minutes: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SessionStartResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: SessionStartData,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SessionStartData {
    pub session_id: i64,
    pub schedule: ModulationSchedule,
}

#[cfg(test)]
mod tests {
    use super::{ModulationSchedule, ModulationStep, SessionStartResponse};

    fn step(timestamp_sec: f64) -> ModulationStep {
        ModulationStep {
            timestamp_sec,
            target_bpm: 100.0,
            binaural_freq: 6.0,
            ramp_duration_sec: 10.0,
            layer: "binaural".to_string(),
        }
    }

    fn schedule(steps: Vec<ModulationStep>) -> ModulationSchedule {
        ModulationSchedule {
            intent: "Deep Focus - Coding".to_string(),
            total_duration_sec: 900.0,
            steps,
        }
    }

    #[test]
    fn session_start_response_deserializes() {
        let json = r#"
        {
            "success": true,
            "message": "Session started",
            "data": {
                "session_id": 42,
                "schedule": {
                    "intent": "Deep Focus - Coding",
                    "total_duration_sec": 1500,
                    "steps": [
                        {
                            "timestamp_sec": 0,
                            "target_bpm": 70,
                            "binaural_freq": 10.0,
                            "ramp_duration_sec": 0
                        }
                    ]
                }
            }
        }
        "#;

        let res: SessionStartResponse = serde_json::from_str(json).expect("valid response");
        assert_eq!(res.data.session_id, 42);
        let sched = &res.data.schedule;
        assert_eq!(sched.steps.len(), 1);
        assert_eq!(sched.steps[0].layer, "binaural");
        assert!((sched.steps[0].binaural_freq - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_accepts_sorted_schedule() {
        let sched = schedule(vec![step(0.0), step(300.0), step(300.0), step(600.0)]);
        assert!(sched.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_steps() {
        let sched = schedule(Vec::new());
        assert!(sched.validate().is_err());
    }

    #[test]
    fn validate_rejects_late_first_step() {
        let sched = schedule(vec![step(5.0), step(300.0)]);
        let err = sched.validate().expect_err("first step must be at 0");
        assert!(err.to_string().contains("first step"));
    }

    #[test]
    fn validate_rejects_unsorted_timestamps() {
        let sched = schedule(vec![step(0.0), step(600.0), step(300.0)]);
        let err = sched.validate().expect_err("timestamps must be sorted");
        assert!(err.to_string().contains("not sorted"));
    }
}
