//! Stereo sine voice pair for binaural playback.
//!
//! The left voice carries the carrier frequency on channel 0, the right
//! voice carries carrier + beat on channel 1. Hard stereo separation is what
//! produces the binaural effect, so neither voice ever bleeds into the other
//! channel. Frequency changes glide linearly over a ramp without resetting
//! phase; the shared gain stage smooths volume changes over a fixed window.

use std::f32::consts::PI;

/// Smoothing window applied to every volume change.
const GAIN_SMOOTHING_SEC: f32 = 0.1;

/// One continuously running sine voice pinned to a single output channel.
struct GlideOscillator {
    phase: f32,
    freq: f32,
    target_freq: f32,
    glide_step: f32,
    glide_remaining: usize,
    sample_rate: f32,
}

impl GlideOscillator {
    fn new(freq: f32, sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            freq,
            target_freq: freq,
            glide_step: 0.0,
            glide_remaining: 0,
            sample_rate,
        }
    }

    /// Begins a linear glide toward `target`. A zero ramp takes effect on the
    /// next rendered sample.
    fn glide_to(&mut self, target: f32, ramp_sec: f32) {
        self.target_freq = target;
        if ramp_sec <= 0.0 {
            self.freq = target;
            self.glide_remaining = 0;
            return;
        }
        let samples = ((ramp_sec * self.sample_rate) as usize).max(1);
        self.glide_step = (target - self.freq) / samples as f32;
        self.glide_remaining = samples;
    }

    fn next_sample(&mut self) -> f32 {
        if self.glide_remaining > 0 {
            self.freq += self.glide_step;
            self.glide_remaining -= 1;
            if self.glide_remaining == 0 {
                self.freq = self.target_freq;
            }
        }
        let dt = 1.0 / self.sample_rate;
        self.phase += 2.0 * PI * self.freq * dt;
        self.phase = self.phase.rem_euclid(2.0 * PI);
        self.phase.sin()
    }
}

/// Left/right voice pair with a shared smoothed gain stage.
pub struct BinauralVoicePair {
    left: GlideOscillator,
    right: GlideOscillator,
    gain: f32,
    target_gain: f32,
    gain_step: f32,
    gain_remaining: usize,
    sample_rate: f32,
}

impl BinauralVoicePair {
    /// Both voices start at their target frequencies; there is no prior
    /// frequency to glide from on the very first tone.
    pub fn new(carrier_hz: f64, beat_hz: f64, gain: f32, sample_rate: f32) -> Self {
        Self {
            left: GlideOscillator::new(carrier_hz as f32, sample_rate),
            right: GlideOscillator::new((carrier_hz + beat_hz) as f32, sample_rate),
            gain: gain.clamp(0.0, 1.0),
            target_gain: gain.clamp(0.0, 1.0),
            gain_step: 0.0,
            gain_remaining: 0,
            sample_rate,
        }
    }

    /// Glides both voices to the new carrier/beat pair in place. Phase is
    /// never reset, so the transition is click-free.
    pub fn retarget(&mut self, carrier_hz: f64, beat_hz: f64, ramp_sec: f64) {
        self.left.glide_to(carrier_hz as f32, ramp_sec as f32);
        self.right
            .glide_to((carrier_hz + beat_hz) as f32, ramp_sec as f32);
    }

    pub fn set_gain(&mut self, level: f32) {
        let level = level.clamp(0.0, 1.0);
        self.target_gain = level;
        let samples = ((GAIN_SMOOTHING_SEC * self.sample_rate) as usize).max(1);
        self.gain_step = (level - self.gain) / samples as f32;
        self.gain_remaining = samples;
    }

    /// Fills an interleaved stereo buffer: left voice on channel 0, right
    /// voice on channel 1.
    pub fn render(&mut self, buffer: &mut [f32]) {
        let channels = 2;
        let frames = buffer.len() / channels;
        for i in 0..frames {
            if self.gain_remaining > 0 {
                self.gain += self.gain_step;
                self.gain_remaining -= 1;
                if self.gain_remaining == 0 {
                    self.gain = self.target_gain;
                }
            }
            buffer[i * 2] = self.left.next_sample() * self.gain;
            buffer[i * 2 + 1] = self.right.next_sample() * self.gain;
        }
    }

    pub fn frequencies(&self) -> (f32, f32) {
        (self.left.freq, self.right.freq)
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

#[cfg(test)]
mod tests {
    use super::BinauralVoicePair;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn render_seconds(pair: &mut BinauralVoicePair, seconds: f32) -> Vec<f32> {
        let mut buffer = vec![0.0f32; (seconds * SAMPLE_RATE) as usize * 2];
        pair.render(&mut buffer);
        buffer
    }

    #[test]
    fn starts_at_target_frequencies() {
        let pair = BinauralVoicePair::new(200.0, 4.0, 0.3, SAMPLE_RATE);
        let (left, right) = pair.frequencies();
        assert!((left - 200.0).abs() < 1e-3);
        assert!((right - 204.0).abs() < 1e-3);
    }

    #[test]
    fn glide_converges_on_new_targets() {
        let mut pair = BinauralVoicePair::new(200.0, 4.0, 0.3, SAMPLE_RATE);
        pair.retarget(200.0, 6.0, 2.0);
        render_seconds(&mut pair, 2.5);
        let (left, right) = pair.frequencies();
        assert!((left - 200.0).abs() < 1e-3);
        assert!((right - 206.0).abs() < 1e-3);
    }

    #[test]
    fn midway_through_glide_frequency_is_between_endpoints() {
        let mut pair = BinauralVoicePair::new(200.0, 4.0, 0.3, SAMPLE_RATE);
        pair.retarget(200.0, 8.0, 2.0);
        render_seconds(&mut pair, 1.0);
        let (_, right) = pair.frequencies();
        assert!(right > 204.0 && right < 208.0, "right was {right}");
    }

    #[test]
    fn zero_ramp_applies_immediately() {
        let mut pair = BinauralVoicePair::new(200.0, 4.0, 0.3, SAMPLE_RATE);
        pair.retarget(210.0, 2.0, 0.0);
        let mut buffer = [0.0f32; 2];
        pair.render(&mut buffer);
        let (left, right) = pair.frequencies();
        assert!((left - 210.0).abs() < 1e-3);
        assert!((right - 212.0).abs() < 1e-3);
    }

    #[test]
    fn retarget_does_not_click() {
        let mut pair = BinauralVoicePair::new(200.0, 4.0, 1.0, SAMPLE_RATE);
        let before = render_seconds(&mut pair, 0.1);
        pair.retarget(220.0, 2.0, 0.0);
        let after = render_seconds(&mut pair, 0.1);

        // Largest per-sample jump a 222 Hz sine can make at this rate, with headroom.
        let max_delta = 2.0 * std::f32::consts::PI * 222.0 / SAMPLE_RATE * 1.5;
        let boundary = [before[before.len() - 2], after[0]];
        assert!((boundary[1] - boundary[0]).abs() < max_delta);
    }

    #[test]
    fn gain_smooths_toward_level() {
        let mut pair = BinauralVoicePair::new(200.0, 4.0, 0.0, SAMPLE_RATE);
        pair.set_gain(0.8);
        render_seconds(&mut pair, 0.05);
        let mid = pair.gain();
        assert!(mid > 0.0 && mid < 0.8, "gain was {mid}");
        render_seconds(&mut pair, 0.1);
        assert!((pair.gain() - 0.8).abs() < 1e-4);
    }

    #[test]
    fn channels_stay_separated() {
        let mut pair = BinauralVoicePair::new(200.0, 4.0, 1.0, SAMPLE_RATE);
        let buffer = render_seconds(&mut pair, 0.25);
        let left_energy: f32 = buffer.iter().step_by(2).map(|v| v * v).sum();
        let right_energy: f32 = buffer.iter().skip(1).step_by(2).map(|v| v * v).sum();
        assert!(left_energy > 0.0);
        assert!(right_energy > 0.0);
        // A 4 Hz inter-aural offset means the channels cannot be identical.
        let diff: f32 = buffer
            .chunks_exact(2)
            .map(|frame| (frame[0] - frame[1]).abs())
            .sum();
        assert!(diff > 1.0);
    }
}
