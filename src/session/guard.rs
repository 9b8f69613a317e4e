use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Holds the session's single-flight flag; dropping it returns the session to
/// idle.
#[derive(Debug)]
pub struct TrainingGuard {
    flag: Arc<AtomicBool>,
}

impl TrainingGuard {
    /// Claims the flag, or fails with `Conflict` if a run already holds it.
    pub fn acquire(flag: &Arc<AtomicBool>) -> Result<TrainingGuard> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Conflict("training already in progress".into()))?;
        Ok(TrainingGuard { flag: Arc::clone(flag) })
    }
}

impl Drop for TrainingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_conflicts_until_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = TrainingGuard::acquire(&flag).unwrap();
        assert!(matches!(TrainingGuard::acquire(&flag), Err(Error::Conflict(_))));
        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(TrainingGuard::acquire(&flag).is_ok());
    }
}
