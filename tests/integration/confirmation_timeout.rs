//! Confirmation window timing, driven by tokio's paused clock.

use crate::helpers::{Effect, Recording, dispatcher, dispatcher_with_config, drain, speech};
use mmi_dispatch::feedback::messages;
use mmi_dispatch::{CapabilityRegistration, DispatchConfig, DispatchOutcome};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn affirm_inside_window_executes() {
    let zoom = Recording::new("ok", Effect::Nothing);
    let (d, _rx) = dispatcher(vec![CapabilityRegistration::new("zoom_in", zoom.clone())]);

    d.dispatch("default", speech("zoom_in", 0.7)).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(
        d.dispatch("default", speech("affirm", 0.95)).await,
        DispatchOutcome::Executed {
            intent: "zoom_in".to_owned(),
            confirmed: true,
        }
    );
    assert_eq!(zoom.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn expiry_is_silent_and_late_affirm_does_nothing() {
    let zoom = Recording::new("ok", Effect::Nothing);
    let (d, mut rx) = dispatcher(vec![CapabilityRegistration::new("zoom_in", zoom.clone())]);

    d.dispatch("default", speech("zoom_in", 0.7)).await;
    assert_eq!(drain(&mut rx).len(), 1);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(d.pending("default").is_none());
    assert!(drain(&mut rx).is_empty());

    assert_eq!(
        d.dispatch("default", speech("affirm", 0.95)).await,
        DispatchOutcome::NothingPending
    );
    assert_eq!(zoom.calls(), 0);
    assert_eq!(drain(&mut rx)[0].text, messages::NOTHING_TO_CONFIRM);
}

#[tokio::test(start_paused = true)]
async fn replacement_restarts_the_window() {
    let zoom_in = Recording::new("in", Effect::Nothing);
    let zoom_out = Recording::new("out", Effect::Nothing);
    let (d, _rx) = dispatcher(vec![
        CapabilityRegistration::new("zoom_in", zoom_in.clone()),
        CapabilityRegistration::new("zoom_out", zoom_out.clone()),
    ]);

    d.dispatch("default", speech("zoom_in", 0.7)).await;
    tokio::time::sleep(Duration::from_secs(6)).await;
    d.dispatch("default", speech("zoom_out", 0.7)).await;

    // Past the first entry's deadline, inside the second's.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(d.pending("default").unwrap().event.intent, "zoom_out");

    assert_eq!(
        d.dispatch("default", speech("affirm", 0.9)).await,
        DispatchOutcome::Executed {
            intent: "zoom_out".to_owned(),
            confirmed: true,
        }
    );
    assert_eq!(zoom_in.calls(), 0);
    assert_eq!(zoom_out.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn configured_timeout_is_honoured() {
    let mut config = DispatchConfig::default();
    config.confirmation.timeout_ms = 2_000;
    let zoom = Recording::new("ok", Effect::Nothing);
    let (d, _rx) =
        dispatcher_with_config(vec![CapabilityRegistration::new("zoom_in", zoom)], &config);

    d.dispatch("default", speech("zoom_in", 0.7)).await;
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(d.pending("default").is_some());
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(d.pending("default").is_none());
}

#[tokio::test(start_paused = true)]
async fn sessions_confirm_independently() {
    let zoom = Recording::new("ok", Effect::Nothing);
    let (d, _rx) = dispatcher(vec![CapabilityRegistration::new("zoom_in", zoom.clone())]);

    d.dispatch("kitchen", speech("zoom_in", 0.7)).await;
    d.dispatch("car", speech("zoom_in", 0.7)).await;

    assert_eq!(
        d.dispatch("car", speech("deny", 0.9)).await,
        DispatchOutcome::Cancelled {
            intent: "zoom_in".to_owned()
        }
    );
    assert!(d.pending("kitchen").is_some());
    assert_eq!(
        d.dispatch("kitchen", speech("affirm", 0.9)).await,
        DispatchOutcome::Executed {
            intent: "zoom_in".to_owned(),
            confirmed: true,
        }
    );
    assert_eq!(zoom.calls(), 1);
}
