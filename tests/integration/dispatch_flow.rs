//! End-to-end dispatch: raw envelopes in, capabilities and feedback out.

use crate::helpers::{Effect, Recording, dispatcher, drain, notification, speech};
use mmi_dispatch::feedback::messages;
use mmi_dispatch::protocol::ControlFrame;
use mmi_dispatch::session::ContextRequirement;
use mmi_dispatch::{
    CapabilityRegistration, ConfirmPolicy, DispatchOutcome, DropReason, FeedbackKind,
};

#[tokio::test]
async fn confident_speech_executes_and_speaks_result() {
    let search = Recording::new("Encontrei 2 cafés", Effect::ShowResults);
    let (d, mut rx) = dispatcher(vec![CapabilityRegistration::new(
        "search_location",
        search.clone(),
    )]);

    let raw = r#"{"intent":"search_location","confidence":0.93,"entities":[{"entity":"query","value":"cafés"}]}"#;
    let outcome = d.handle_raw(raw).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Executed {
            intent: "search_location".to_owned(),
            confirmed: false,
        }
    );
    assert_eq!(search.calls(), 1);
    assert_eq!(search.last_entities()[0].raw_text, "cafés");
    let spoken = drain(&mut rx);
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].kind, FeedbackKind::Success);
    assert_eq!(spoken[0].text, "Encontrei 2 cafés");
    assert_eq!(d.sessions().get("default").await.last_result_set.len(), 2);
}

#[tokio::test]
async fn medium_confidence_asks_then_affirm_executes_once() {
    let zoom = Recording::new("Zoom aumentado", Effect::Nothing);
    let (d, mut rx) = dispatcher(vec![CapabilityRegistration::new("zoom_in", zoom.clone())]);

    let outcome = d.dispatch("default", speech("zoom_in", 0.7)).await;
    assert_eq!(
        outcome,
        DispatchOutcome::AwaitingConfirmation {
            intent: "zoom_in".to_owned(),
            lower_certainty: false,
        }
    );
    assert_eq!(zoom.calls(), 0);
    let prompt = drain(&mut rx);
    assert_eq!(prompt[0].kind, FeedbackKind::Prompt);
    assert_eq!(prompt[0].text, "Querias aumentar o zoom?");

    let outcome = d.dispatch("default", speech("affirm", 0.99)).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Executed {
            intent: "zoom_in".to_owned(),
            confirmed: true,
        }
    );
    assert_eq!(zoom.calls(), 1);

    // A second "yes" has nothing left to confirm.
    let outcome = d.dispatch("default", speech("affirm", 0.99)).await;
    assert_eq!(outcome, DispatchOutcome::NothingPending);
    assert_eq!(zoom.calls(), 1);
    let spoken = drain(&mut rx);
    assert_eq!(spoken.last().unwrap().text, messages::NOTHING_TO_CONFIRM);
}

#[tokio::test]
async fn deny_cancels_without_executing() {
    let zoom = Recording::new("Zoom aumentado", Effect::Nothing);
    let (d, mut rx) = dispatcher(vec![CapabilityRegistration::new("zoom_in", zoom.clone())]);

    d.dispatch("default", speech("zoom_in", 0.65)).await;
    let outcome = d.dispatch("default", speech("deny", 0.9)).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Cancelled {
            intent: "zoom_in".to_owned()
        }
    );
    assert_eq!(zoom.calls(), 0);
    assert!(d.pending("default").is_none());
    let spoken = drain(&mut rx);
    assert_eq!(spoken.last().unwrap().text, messages::CANCELLED);
}

#[tokio::test]
async fn uncertain_answers_leave_the_question_open() {
    let zoom = Recording::new("ok", Effect::Nothing);
    let (d, mut rx) = dispatcher(vec![CapabilityRegistration::new("zoom_in", zoom.clone())]);

    d.dispatch("default", speech("zoom_in", 0.7)).await;
    drain(&mut rx);

    for answer in ["affirm", "deny"] {
        assert_eq!(
            d.dispatch("default", speech(answer, 0.2)).await,
            DispatchOutcome::Discarded {
                intent: answer.to_owned()
            }
        );
    }
    assert_eq!(zoom.calls(), 0);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(d.pending("default").unwrap().event.intent, "zoom_in");

    assert_eq!(
        d.dispatch("default", speech("affirm", 0.9)).await,
        DispatchOutcome::Executed {
            intent: "zoom_in".to_owned(),
            confirmed: true,
        }
    );
    assert_eq!(zoom.calls(), 1);
}

#[tokio::test]
async fn deny_with_nothing_pending_is_acknowledged() {
    let (d, mut rx) = dispatcher(Vec::new());
    assert_eq!(
        d.dispatch("default", speech("deny", 0.9)).await,
        DispatchOutcome::NothingPending
    );
    assert_eq!(drain(&mut rx)[0].text, messages::NOTHING_TO_CANCEL);
}

#[tokio::test]
async fn low_band_prompt_admits_uncertainty() {
    let zoom = Recording::new("ok", Effect::Nothing);
    let (d, mut rx) = dispatcher(vec![CapabilityRegistration::new("zoom_out", zoom)]);

    let outcome = d.dispatch("default", speech("zoom_out", 0.5)).await;
    assert_eq!(
        outcome,
        DispatchOutcome::AwaitingConfirmation {
            intent: "zoom_out".to_owned(),
            lower_certainty: true,
        }
    );
    let spoken = drain(&mut rx);
    let prompt = &spoken[0].text;
    assert!(prompt.starts_with(messages::LOWER_CERTAINTY_PREFIX), "{prompt}");
    assert!(prompt.ends_with("Querias diminuir o zoom?"), "{prompt}");
}

#[tokio::test]
async fn below_low_is_discarded_silently_and_keeps_pending() {
    let zoom = Recording::new("ok", Effect::Nothing);
    let (d, mut rx) = dispatcher(vec![
        CapabilityRegistration::new("zoom_in", zoom.clone()),
        CapabilityRegistration::new("zoom_out", zoom.clone()),
    ]);

    d.dispatch("default", speech("zoom_in", 0.7)).await;
    drain(&mut rx);

    let outcome = d.dispatch("default", speech("zoom_out", 0.2)).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Discarded {
            intent: "zoom_out".to_owned()
        }
    );
    assert!(drain(&mut rx).is_empty());
    assert_eq!(d.pending("default").unwrap().event.intent, "zoom_in");
}

#[tokio::test]
async fn high_confidence_command_supersedes_pending() {
    let zoom = Recording::new("ok", Effect::Nothing);
    let traffic = Recording::new("Trânsito visível", Effect::Nothing);
    let (d, _rx) = dispatcher(vec![
        CapabilityRegistration::new("zoom_in", zoom.clone()),
        CapabilityRegistration::new("show_traffic", traffic.clone()),
    ]);

    d.dispatch("default", speech("zoom_in", 0.7)).await;
    d.dispatch("default", speech("show_traffic", 0.95)).await;

    assert!(d.pending("default").is_none());
    assert_eq!(
        d.dispatch("default", speech("affirm", 0.9)).await,
        DispatchOutcome::NothingPending
    );
    assert_eq!(zoom.calls(), 0);
    assert_eq!(traffic.calls(), 1);
}

#[tokio::test]
async fn always_policy_confirms_even_when_certain() {
    let nav = Recording::new("Navegação iniciada", Effect::Nothing);
    let route = Recording::new("Direções para Aveiro", Effect::ShowRoute);
    let (d, mut rx) = dispatcher(vec![
        CapabilityRegistration::new("get_directions", route),
        CapabilityRegistration::new("start_navigation", nav.clone())
            .with_policy(ConfirmPolicy::Always)
            .with_requirement(ContextRequirement::ActiveRoute),
    ]);

    d.dispatch("default", speech("get_directions", 0.95)).await;
    let outcome = d.dispatch("default", speech("start_navigation", 0.99)).await;
    assert_eq!(
        outcome,
        DispatchOutcome::AwaitingConfirmation {
            intent: "start_navigation".to_owned(),
            lower_certainty: false,
        }
    );
    d.dispatch("default", speech("affirm", 0.9)).await;
    assert_eq!(nav.calls(), 1);
    let texts: Vec<_> = drain(&mut rx).into_iter().map(|m| m.text).collect();
    assert_eq!(
        texts,
        vec![
            "Direções para Aveiro".to_owned(),
            "Devo iniciar a navegação?".to_owned(),
            "Navegação iniciada".to_owned(),
        ]
    );
}

#[tokio::test]
async fn contextual_command_without_context_explains_instead_of_prompting() {
    let select = Recording::new("Selecionado", Effect::Nothing);
    let search = Recording::new("Resultados", Effect::ShowResults);
    let (d, mut rx) = dispatcher(vec![
        CapabilityRegistration::new("search_location", search),
        CapabilityRegistration::new("select_place", select.clone())
            .with_requirement(ContextRequirement::ResultSet),
    ]);

    let event = speech("select_place", 0.7).with_entity("ordinal", "segundo");
    let outcome = d.dispatch("default", event).await;
    assert_eq!(
        outcome,
        DispatchOutcome::NoActiveContext {
            intent: "select_place".to_owned(),
            requirement: ContextRequirement::ResultSet,
        }
    );
    assert!(d.pending("default").is_none());
    let spoken = drain(&mut rx);
    assert_eq!(spoken.len(), 1);
    assert_eq!(
        spoken[0].text,
        messages::no_active_context(ContextRequirement::ResultSet)
    );

    d.dispatch("default", speech("search_location", 0.9)).await;
    let event = speech("select_place", 0.9).with_entity("ordinal", "segundo");
    assert_eq!(
        d.dispatch("default", event).await,
        DispatchOutcome::Executed {
            intent: "select_place".to_owned(),
            confirmed: false,
        }
    );
    assert_eq!(select.last_entities()[0].value.as_ordinal(), Some(2));
}

#[tokio::test]
async fn gestures_are_normalized_and_unmapped_codes_dropped() {
    let swipe = Recording::new("", Effect::Nothing);
    let (d, mut rx) = dispatcher(vec![CapabilityRegistration::new(
        "gesture_swipe_left",
        swipe.clone(),
    )]);

    let outcome = d
        .handle_raw(&notification("ctx-1", r#"{"recognized":["GESTURES","SWIPELL"]}"#))
        .await;
    assert_eq!(
        outcome,
        DispatchOutcome::Executed {
            intent: "gesture_swipe_left".to_owned(),
            confirmed: false,
        }
    );
    assert_eq!(swipe.calls(), 1);

    assert_eq!(
        d.handle_raw("[GESTURES][WAVE]").await,
        DispatchOutcome::Dropped(DropReason::UnmappedGesture)
    );
    // Empty success messages are not spoken.
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn thumbs_up_gesture_confirms_spoken_request() {
    let zoom = Recording::new("ok", Effect::Nothing);
    let (d, _rx) = dispatcher(vec![CapabilityRegistration::new("zoom_in", zoom.clone())]);

    d.dispatch("default", speech("zoom_in", 0.7)).await;
    let outcome = d.handle_raw("[GESTURES][THUMBSUP]").await;
    assert_eq!(
        outcome,
        DispatchOutcome::Executed {
            intent: "zoom_in".to_owned(),
            confirmed: true,
        }
    );
    assert_eq!(zoom.calls(), 1);
}

#[tokio::test]
async fn transport_noise_never_reaches_the_gate() {
    let (d, mut rx) = dispatcher(Vec::new());
    assert_eq!(
        d.handle_raw("RENEW").await,
        DispatchOutcome::Ignored(ControlFrame::KeepAlive)
    );
    assert_eq!(
        d.handle_raw("<not xml").await,
        DispatchOutcome::Dropped(DropReason::MalformedEnvelope)
    );
    assert_eq!(
        d.handle_raw(r#"{"intent":"teleport","confidence":0.99}"#).await,
        DispatchOutcome::Dropped(DropReason::UnknownIntent)
    );
    assert!(drain(&mut rx).is_empty());
}
