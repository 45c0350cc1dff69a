//! Proactive prompt after a stretch of user inactivity.

use crate::config::IdleConfig;
use crate::feedback::{FeedbackEmitter, FeedbackKind};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Prompt for a given inactivity length; longer silences get gentler prompts.
#[must_use]
pub fn idle_prompt(idle_for: Duration) -> &'static str {
    match idle_for.as_secs() {
        0..180 => "Não te vejo a usar o sistema. Precisas de ajuda?",
        180..300 => "Ainda aí? Posso ajudar com alguma coisa?",
        _ => "Se precisares de ajuda, é só dizer!",
    }
}

/// Speaks at most one prompt per idle stretch.
pub struct IdleMonitor {
    threshold: Duration,
    check_interval: Duration,
    activity: watch::Receiver<Instant>,
    feedback: FeedbackEmitter,
}

impl IdleMonitor {
    #[must_use]
    pub fn new(
        config: &IdleConfig,
        activity: watch::Receiver<Instant>,
        feedback: FeedbackEmitter,
    ) -> Self {
        Self {
            threshold: Duration::from_secs(config.threshold_secs),
            check_interval: Duration::from_secs(config.check_interval_secs.max(1)),
            activity,
            feedback,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Activity timestamp we already prompted for.
        let mut prompted_for: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let last = *self.activity.borrow();
                    let idle_for = Instant::now().saturating_duration_since(last);
                    if idle_for >= self.threshold && prompted_for != Some(last) {
                        tracing::info!(idle_secs = idle_for.as_secs(), "user idle; prompting");
                        self.feedback.speak(FeedbackKind::Idle, idle_prompt(idle_for));
                        prompted_for = Some(last);
                    }
                }
            }
        }
        tracing::debug!("idle monitor stopped");
    }
}
