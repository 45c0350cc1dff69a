//! Per-session execution lock: one invocation per session, sessions in parallel.

use crate::helpers::{dispatcher, speech};
use async_trait::async_trait;
use mmi_dispatch::{
    Capability, CapabilityError, CapabilityOutcome, CapabilityRegistration, ContextHandle,
    DispatchOutcome, Entity,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Capability that takes a while and tracks how many invocations overlap.
#[derive(Default)]
struct Slow {
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Slow {
    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Capability for Slow {
    async fn execute(
        &self,
        _entities: &[Entity],
        _context: &mut ContextHandle,
    ) -> Result<CapabilityOutcome, CapabilityError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(CapabilityOutcome::success(""))
    }
}

fn executed(outcome: &DispatchOutcome) -> bool {
    matches!(outcome, DispatchOutcome::Executed { .. })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_invocation_per_session_at_a_time() {
    let slow = Arc::new(Slow::default());
    let (d, _rx) = dispatcher(vec![CapabilityRegistration::new("zoom_in", slow.clone())]);

    let (first, second) = tokio::join!(
        d.dispatch("s", speech("zoom_in", 0.95)),
        d.dispatch("s", speech("zoom_in", 0.95)),
    );
    assert!(executed(&first) && executed(&second), "{first:?} {second:?}");
    assert_eq!(slow.peak(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn different_sessions_run_in_parallel() {
    let slow = Arc::new(Slow::default());
    let (d, _rx) = dispatcher(vec![CapabilityRegistration::new("zoom_in", slow.clone())]);

    let (first, second) = tokio::join!(
        d.dispatch("s1", speech("zoom_in", 0.95)),
        d.dispatch("s2", speech("zoom_in", 0.95)),
    );
    assert!(executed(&first) && executed(&second), "{first:?} {second:?}");
    assert_eq!(slow.peak(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn speech_and_gesture_share_the_session_lock() {
    let slow = Arc::new(Slow::default());
    let (d, _rx) = dispatcher(vec![
        CapabilityRegistration::new("zoom_in", slow.clone()),
        CapabilityRegistration::new("gesture_zoom_in", slow.clone()),
    ]);

    let (spoken, gestured) = tokio::join!(
        d.handle_raw(r#"{"intent":"zoom_in","confidence":0.95}"#),
        d.handle_raw("[GESTURES][ZOOMI]"),
    );
    assert!(executed(&spoken) && executed(&gestured), "{spoken:?} {gestured:?}");
    assert_eq!(slow.peak(), 1);
}
