use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;

use crate::error::OcrError;

/// Availability of an engine as observed by its capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeState {
    Unknown,
    Available,
    Unavailable,
}

impl ProbeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeState::Unknown => "unknown",
            ProbeState::Available => "available",
            ProbeState::Unavailable => "unavailable",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ProbeState::Available)
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memoized outcome of probing a native backend.
///
/// The first call to [`CapabilityProbe::check_with`] runs the probe and
/// stores the bound handle (or its absence). Concurrent first callers block
/// until that probe finishes and then observe the same outcome; the probe
/// closure never runs twice.
pub struct CapabilityProbe<H> {
    engine: &'static str,
    state: OnceLock<Option<H>>,
}

impl<H> CapabilityProbe<H> {
    pub const fn new(engine: &'static str) -> Self {
        Self {
            engine,
            state: OnceLock::new(),
        }
    }

    pub fn check_with(&self, probe: impl FnOnce() -> Option<H>) -> bool {
        self.state.get_or_init(probe).is_some()
    }

    pub fn state(&self) -> ProbeState {
        match self.state.get() {
            None => ProbeState::Unknown,
            Some(Some(_)) => ProbeState::Available,
            Some(None) => ProbeState::Unavailable,
        }
    }

    /// Returns the bound handle, failing when the probe has not run or did
    /// not succeed. Never probes implicitly.
    pub fn bound(&self) -> Result<&H, OcrError> {
        self.state
            .get()
            .and_then(Option::as_ref)
            .ok_or_else(|| OcrError::unavailable(self.engine))
    }
}

impl<H> fmt::Debug for CapabilityProbe<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityProbe")
            .field("engine", &self.engine)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn unprobed_engine_is_unavailable() {
        let probe: CapabilityProbe<u32> = CapabilityProbe::new("test");
        assert_eq!(probe.state(), ProbeState::Unknown);
        assert!(matches!(
            probe.bound(),
            Err(OcrError::EngineUnavailable { engine }) if engine == "test"
        ));
    }

    #[test]
    fn failed_probe_is_remembered() {
        let probe: CapabilityProbe<u32> = CapabilityProbe::new("test");
        assert!(!probe.check_with(|| None));
        assert!(!probe.check_with(|| Some(1)));
        assert_eq!(probe.state(), ProbeState::Unavailable);
        assert!(probe.bound().is_err());
    }

    #[test]
    fn repeated_checks_probe_once() {
        let calls = AtomicUsize::new(0);
        let probe = CapabilityProbe::new("test");
        for _ in 0..5 {
            assert!(probe.check_with(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Some(42u32)
            }));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*probe.bound().unwrap(), 42);
    }

    #[test]
    fn concurrent_first_checks_share_one_probe() {
        let calls = AtomicUsize::new(0);
        let probe = CapabilityProbe::new("test");
        let barrier = Barrier::new(8);
        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    let available = probe.check_with(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        Some(())
                    });
                    assert!(available);
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.state(), ProbeState::Available);
    }
}
