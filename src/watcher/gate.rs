//! Single-flight guard for sync cycles.

use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether a cycle is running and whether another one is owed.
///
/// Claiming is a single compare-and-set, so two contexts can never both
/// believe they own the run.
#[derive(Debug, Default)]
pub struct CycleGate {
    running: AtomicBool,
    owed: AtomicBool,
}

/// Proof of ownership of the running cycle. Released on drop.
#[derive(Debug)]
pub struct CycleClaim<'a> {
    gate: &'a CycleGate,
}

impl CycleGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to run a cycle, or `None` if one is running.
    #[must_use]
    pub fn try_claim(&self) -> Option<CycleClaim<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleClaim { gate: self })
    }

    /// Record that one more cycle is needed after the current one.
    pub fn defer(&self) {
        self.owed.store(true, Ordering::Release);
    }

    /// Consume the owed marker.
    pub fn take_owed(&self) -> bool {
        self.owed.swap(false, Ordering::AcqRel)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for CycleClaim<'_> {
    fn drop(&mut self) {
        self.gate.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_claim_is_exclusive() {
        let gate = CycleGate::new();
        let claim = gate.try_claim().unwrap();
        assert!(gate.is_running());
        assert!(gate.try_claim().is_none());

        drop(claim);
        assert!(!gate.is_running());
        assert!(gate.try_claim().is_some());
    }

    #[test]
    fn test_owed_collapses() {
        let gate = CycleGate::new();
        gate.defer();
        gate.defer();
        gate.defer();
        assert!(gate.take_owed());
        assert!(!gate.take_owed());
    }

    #[test]
    fn test_concurrent_claims_never_overlap() {
        let gate = Arc::new(CycleGate::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    for _ in 0..200 {
                        if let Some(_claim) = gate.try_claim() {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            active.fetch_sub(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
