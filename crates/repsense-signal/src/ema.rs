//! Exponential moving average smoothing
//!
//! `smoothed(t) = alpha * raw(t) + (1 - alpha) * smoothed(t - 1)`, seeded by
//! the first observation rather than zero so early transitions are unbiased.

use std::collections::HashMap;

use repsense_core::{AngleMap, RepsenseError, RepsenseResult};

/// Check that `alpha` lies in (0, 1]
pub fn validate_alpha(name: &'static str, alpha: f32) -> RepsenseResult<()> {
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(())
    } else {
        Err(RepsenseError::InvalidAlpha { name, value: alpha })
    }
}

/// EMA state for a single scalar signal
#[derive(Debug, Clone, PartialEq)]
pub struct Ema {
    alpha: f32,
    value: Option<f32>,
}

impl Ema {
    /// `alpha` is expected to be validated by the caller
    pub fn new(alpha: f32) -> Self {
        Self { alpha, value: None }
    }

    /// Fold one raw sample in and return the smoothed value
    pub fn update(&mut self, raw: f32) -> f32 {
        let next = match self.value {
            Some(prev) => self.alpha * raw + (1.0 - self.alpha) * prev,
            None => raw,
        };
        self.value = Some(next);
        next
    }

    /// Current smoothed value, `None` before the first sample
    pub fn value(&self) -> Option<f32> {
        self.value
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_seeded(&self) -> bool {
        self.value.is_some()
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Lazily created EMA states keyed by signal name, all sharing one alpha
#[derive(Debug, Clone)]
pub struct SmootherBank {
    alpha: f32,
    signals: HashMap<String, Ema>,
}

impl SmootherBank {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            signals: HashMap::new(),
        }
    }

    /// Smooth one sample of the named signal
    pub fn update(&mut self, name: &str, raw: f32) -> f32 {
        if let Some(ema) = self.signals.get_mut(name) {
            return ema.update(raw);
        }
        let mut ema = Ema::new(self.alpha);
        let value = ema.update(raw);
        self.signals.insert(name.to_string(), ema);
        value
    }

    /// Smooth every entry of an angle map; joints absent this frame keep
    /// their state untouched and stay absent from the result
    pub fn smooth_angles(&mut self, raw: &AngleMap) -> AngleMap {
        raw.iter()
            .map(|(name, &angle)| (name.clone(), self.update(name, angle)))
            .collect()
    }

    pub fn value(&self, name: &str) -> Option<f32> {
        self.signals.get(name).and_then(Ema::value)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Drop every state; the next sample of each signal seeds afresh
    pub fn reset(&mut self) {
        self.signals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_sample_passthrough() {
        let mut ema = Ema::new(0.3);
        assert_eq!(ema.value(), None);
        assert_eq!(ema.update(142.0), 142.0);
        assert_eq!(ema.value(), Some(142.0));
    }

    #[test]
    fn test_second_sample_blends() {
        let mut ema = Ema::new(0.25);
        ema.update(100.0);
        let v = ema.update(200.0);
        assert!((v - 125.0).abs() < 1e-4);
    }

    #[test]
    fn test_alpha_one_tracks_raw() {
        let mut ema = Ema::new(1.0);
        ema.update(10.0);
        assert_eq!(ema.update(90.0), 90.0);
    }

    #[test]
    fn test_reset_reseeds() {
        let mut ema = Ema::new(0.1);
        ema.update(0.0);
        ema.reset();
        assert!(!ema.is_seeded());
        assert_eq!(ema.update(50.0), 50.0);
    }

    #[test]
    fn test_validate_alpha() {
        assert!(validate_alpha("angle", 0.5).is_ok());
        assert!(validate_alpha("angle", 1.0).is_ok());
        assert!(validate_alpha("angle", 0.0).is_err());
        assert!(validate_alpha("angle", 1.2).is_err());
        assert!(validate_alpha("angle", f32::NAN).is_err());
    }

    #[test]
    fn test_bank_creates_signals_lazily() {
        let mut bank = SmootherBank::new(0.5);
        assert!(bank.is_empty());
        assert_eq!(bank.update("left_knee", 90.0), 90.0);
        assert_eq!(bank.update("left_knee", 110.0), 100.0);
        assert_eq!(bank.update("right_knee", 170.0), 170.0);
        assert_eq!(bank.len(), 2);
        bank.reset();
        assert_eq!(bank.value("left_knee"), None);
    }

    #[test]
    fn test_smooth_angles_skips_absent_joints() {
        let mut bank = SmootherBank::new(0.5);
        let mut raw = AngleMap::new();
        raw.insert("left_elbow".into(), 100.0);
        raw.insert("right_elbow".into(), 60.0);
        bank.smooth_angles(&raw);

        raw.remove("right_elbow");
        raw.insert("left_elbow".into(), 120.0);
        let smoothed = bank.smooth_angles(&raw);
        assert_eq!(smoothed.len(), 1);
        assert!((smoothed["left_elbow"] - 110.0).abs() < 1e-4);
        assert_eq!(bank.value("right_elbow"), Some(60.0));
    }

    proptest! {
        #[test]
        fn prop_constant_input_converges(
            alpha in 0.05f32..=1.0,
            seed in 0.0f32..180.0,
            target in 0.0f32..180.0,
        ) {
            let mut ema = Ema::new(alpha);
            ema.update(seed);
            let mut v = seed;
            for _ in 0..400 {
                v = ema.update(target);
            }
            prop_assert!((v - target).abs() < 1e-2);
        }

        #[test]
        fn prop_output_stays_between_seed_and_target(
            alpha in 0.01f32..=1.0,
            seed in 0.0f32..180.0,
            target in 0.0f32..180.0,
        ) {
            let mut ema = Ema::new(alpha);
            ema.update(seed);
            let v = ema.update(target);
            let (lo, hi) = if seed < target { (seed, target) } else { (target, seed) };
            prop_assert!(v >= lo - 1e-3 && v <= hi + 1e-3);
        }
    }
}
