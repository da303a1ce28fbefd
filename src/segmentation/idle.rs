pub const IDLE_THRESHOLD_SECONDS: f64 = 180.0;

/// Stateless idle predicate. The hysteresis (staying idle until input comes
/// back) lives in the live segmenter.
#[derive(Debug, Clone, Copy)]
pub struct IdleDetector {
    threshold_secs: f64,
}

impl IdleDetector {
    pub fn new(threshold_secs: f64) -> Self {
        Self { threshold_secs }
    }

    /// Strictly greater than the threshold. NaN is never idle.
    pub fn is_idle(&self, idle_seconds: f64) -> bool {
        idle_seconds > self.threshold_secs
    }

    pub fn threshold_secs(&self) -> f64 {
        self.threshold_secs
    }
}

impl Default for IdleDetector {
    fn default() -> Self {
        Self::new(IDLE_THRESHOLD_SECONDS)
    }
}

pub fn is_idle(idle_seconds: f64) -> bool {
    IdleDetector::default().is_idle(idle_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_exclusive() {
        assert!(!is_idle(180.0));
        assert!(is_idle(180.5));
        assert!(!is_idle(0.0));
    }

    #[test]
    fn nonsense_input_is_not_idle() {
        assert!(!is_idle(f64::NAN));
        assert!(!is_idle(-5.0));
    }

    #[test]
    fn custom_threshold() {
        let detector = IdleDetector::new(30.0);
        assert!(detector.is_idle(31.0));
        assert!(!detector.is_idle(30.0));
        assert_eq!(detector.threshold_secs(), 30.0);
    }
}
