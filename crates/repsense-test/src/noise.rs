//! Estimator noise for synthetic landmark streams
//!
//! Simulates an imperfect pose estimator:
//! - Positional jitter on every landmark
//! - Occlusion (a landmark reported with low visibility)
//! - Dropped detections, single or in bursts

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::Rng;

use repsense_core::{Landmark, LandmarkFrame};

/// Visibility reported for an occluded landmark
pub const OCCLUDED_VISIBILITY: f32 = 0.05;

/// Positional jitter distribution, in normalized frame units
#[derive(Clone, Debug)]
pub enum JitterDistribution {
    None,
    /// Uniform in `[-amplitude, amplitude]`
    Uniform { amplitude: f32 },
    /// Normal with zero mean
    Normal { stddev: f32 },
}

impl JitterDistribution {
    pub fn sample(&self, rng: &mut StdRng) -> f32 {
        match self {
            JitterDistribution::None => 0.0,
            &JitterDistribution::Uniform { amplitude } => {
                if amplitude <= 0.0 {
                    return 0.0;
                }
                Uniform::new_inclusive(-amplitude, amplitude).sample(rng)
            }
            JitterDistribution::Normal { stddev } => {
                // Box-Muller
                let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
                let u2: f32 = rng.gen();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
                stddev * z
            }
        }
    }
}

/// Estimator noise configuration
#[derive(Clone, Debug)]
pub struct NoiseConfig {
    pub jitter: JitterDistribution,
    /// Per-landmark probability of being reported occluded
    pub occlusion_rate: f64,
    /// Per-frame probability of no detection
    pub dropout_rate: f64,
    /// Per-frame probability of starting a dropout burst
    pub burst_dropout_prob: f64,
    /// Burst length range, frames
    pub burst_length: (u32, u32),
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self::good()
    }
}

impl NoiseConfig {
    /// Exact landmarks, every frame detected
    pub fn clean() -> Self {
        NoiseConfig {
            jitter: JitterDistribution::None,
            occlusion_rate: 0.0,
            dropout_rate: 0.0,
            burst_dropout_prob: 0.0,
            burst_length: (0, 0),
        }
    }

    /// Steady webcam, good lighting
    pub fn good() -> Self {
        NoiseConfig {
            jitter: JitterDistribution::Uniform { amplitude: 0.002 },
            occlusion_rate: 0.01,
            dropout_rate: 0.01,
            burst_dropout_prob: 0.0,
            burst_length: (0, 0),
        }
    }

    /// Low light, subject partly out of frame now and then
    pub fn poor() -> Self {
        NoiseConfig {
            jitter: JitterDistribution::Normal { stddev: 0.003 },
            occlusion_rate: 0.05,
            dropout_rate: 0.05,
            burst_dropout_prob: 0.02,
            burst_length: (2, 5),
        }
    }
}

/// Noise counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoiseStats {
    pub frames_rendered: u64,
    pub frames_dropped: u64,
    pub landmarks_occluded: u64,
}

/// Applies a `NoiseConfig` frame by frame
#[derive(Debug)]
pub struct EstimatorNoise {
    config: NoiseConfig,
    burst_remaining: u32,
    stats: NoiseStats,
}

impl EstimatorNoise {
    pub fn new(config: NoiseConfig) -> Self {
        Self {
            config,
            burst_remaining: 0,
            stats: NoiseStats::default(),
        }
    }

    /// Corrupt `frame`, or drop it entirely
    pub fn apply(&mut self, frame: &LandmarkFrame, rng: &mut StdRng) -> Option<LandmarkFrame> {
        if self.should_drop(rng) {
            self.stats.frames_dropped += 1;
            return None;
        }
        self.stats.frames_rendered += 1;

        let mut occluded = 0;
        let noisy = frame.map(|l| {
            let mut out = Landmark {
                x: l.x + self.config.jitter.sample(rng),
                y: l.y + self.config.jitter.sample(rng),
                ..*l
            };
            if self.config.occlusion_rate > 0.0 && rng.gen::<f64>() < self.config.occlusion_rate {
                out.visibility = Some(OCCLUDED_VISIBILITY);
                occluded += 1;
            }
            out
        });
        self.stats.landmarks_occluded += occluded;
        Some(noisy)
    }

    fn should_drop(&mut self, rng: &mut StdRng) -> bool {
        if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            return true;
        }

        let burst = self.config.burst_dropout_prob;
        if burst > 0.0 && rng.gen::<f64>() < burst {
            let (min, max) = self.config.burst_length;
            self.burst_remaining = rng.gen_range(min..=max).saturating_sub(1);
            return true;
        }

        self.config.dropout_rate > 0.0 && rng.gen::<f64>() < self.config.dropout_rate
    }

    pub fn stats(&self) -> &NoiseStats {
        &self.stats
    }

    pub fn config(&self) -> &NoiseConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn frame() -> LandmarkFrame {
        LandmarkFrame::from_landmarks(&[Landmark::new(0.5, 0.5); 33])
    }

    #[test]
    fn test_clean_noise_is_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut noise = EstimatorNoise::new(NoiseConfig::clean());
        for _ in 0..50 {
            assert_eq!(noise.apply(&frame(), &mut rng), Some(frame()));
        }
        assert_eq!(noise.stats().frames_dropped, 0);
    }

    #[test]
    fn test_uniform_jitter_bounded() {
        let mut rng = StdRng::seed_from_u64(42);
        let jitter = JitterDistribution::Uniform { amplitude: 0.01 };
        for _ in 0..1000 {
            assert!(jitter.sample(&mut rng).abs() <= 0.01);
        }
    }

    #[test]
    fn test_poor_conditions_drop_and_occlude() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut noise = EstimatorNoise::new(NoiseConfig::poor());
        for _ in 0..2000 {
            noise.apply(&frame(), &mut rng);
        }
        let stats = noise.stats();
        assert_eq!(stats.frames_rendered + stats.frames_dropped, 2000);
        assert!(stats.frames_dropped > 50);
        assert!(stats.landmarks_occluded > 100);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut noise = EstimatorNoise::new(NoiseConfig::poor());
            (0..20).map(|_| noise.apply(&frame(), &mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
    }
}
