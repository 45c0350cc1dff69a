//! Full catalog wired to the automation channel, with a fake automation layer.

use crate::helpers::{drain, speech};
use mmi_dispatch::automation::{self, AutomationReply, PendingAutomation};
use mmi_dispatch::catalog::register_catalog;
use mmi_dispatch::feedback::messages;
use mmi_dispatch::normalizer::{GESTURE_TABLE, GestureKind};
use mmi_dispatch::registry::Capability;
use mmi_dispatch::session::{ContextPatch, ContextRequirement, PlaceRef, RouteRef};
use mmi_dispatch::{DispatchConfig, DispatchOutcome, Dispatcher, FeedbackEmitter, RegistryBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Answers like the map UI would: searches yield results, directions yield a route.
async fn fake_map(mut requests: mpsc::Receiver<PendingAutomation>) {
    while let Some(pending) = requests.recv().await {
        let request = pending.request.clone();
        let mut reply = AutomationReply {
            id: request.id.clone(),
            success: true,
            message: format!("ok {}", request.intent),
            ..AutomationReply::default()
        };
        match request.intent.as_str() {
            "search_location" | "find_place" => {
                reply.context = Some(ContextPatch {
                    last_result_set: Some(vec![
                        PlaceRef::new("a", "Farol"),
                        PlaceRef::new("b", "Praia"),
                    ]),
                    ..ContextPatch::default()
                });
            }
            "get_directions" => {
                reply.context = Some(ContextPatch {
                    active_route: Some(RouteRef {
                        origin: None,
                        destination: "Praia".to_owned(),
                        mode: None,
                    }),
                    ..ContextPatch::default()
                });
            }
            "select_place" => {
                let rank = request
                    .entities
                    .iter()
                    .find_map(|e| e.value.as_ordinal())
                    .unwrap_or(1) as usize;
                match request.context.last_result_set.get(rank - 1) {
                    Some(place) => reply.message = format!("Selecionei {}", place.name),
                    None => {
                        reply.success = false;
                        reply.message = "Não existe esse resultado".to_owned();
                    }
                }
            }
            "swap_route" => {
                reply.missing_context = Some(ContextRequirement::ActiveRoute);
                reply.success = false;
            }
            _ => {}
        }
        pending.respond(reply);
    }
}

fn wired() -> (Dispatcher, mpsc::Receiver<mmi_dispatch::FeedbackMessage>) {
    let config = DispatchConfig::default();
    let (client, requests) = automation::channel(8, Duration::from_secs(5));
    let mut builder = RegistryBuilder::new();
    register_catalog(&mut builder, |intent| {
        Arc::new(client.capability(intent)) as Arc<dyn Capability>
    })
    .unwrap();
    let registry = builder.build();
    registry.check_gesture_coverage().unwrap();
    tokio::spawn(fake_map(requests));
    let (feedback, rx) = FeedbackEmitter::channel(32);
    (Dispatcher::new(Arc::new(registry), &config, feedback), rx)
}

#[tokio::test]
async fn search_then_select_by_ordinal() {
    let (d, mut rx) = wired();

    let search = speech("search_location", 0.9).with_entity("location", "praias");
    assert!(matches!(
        d.dispatch("default", search).await,
        DispatchOutcome::Executed { .. }
    ));
    assert_eq!(d.sessions().get("default").await.last_result_set.len(), 2);

    let select = speech("select_place", 0.9).with_entity("ordinal", "segunda");
    assert!(matches!(
        d.dispatch("default", select).await,
        DispatchOutcome::Executed { .. }
    ));
    let texts: Vec<_> = drain(&mut rx).into_iter().map(|m| m.text).collect();
    assert_eq!(texts.last().unwrap(), "Selecionei Praia");
}

#[tokio::test]
async fn automation_failure_message_is_spoken_and_context_kept() {
    let (d, mut rx) = wired();
    d.dispatch("default", speech("search_location", 0.9)).await;
    drain(&mut rx);

    let select = speech("select_place", 0.9).with_entity("ordinal", "9");
    assert_eq!(
        d.dispatch("default", select).await,
        DispatchOutcome::Failed {
            intent: "select_place".to_owned()
        }
    );
    assert_eq!(drain(&mut rx)[0].text, "Não existe esse resultado");
    assert_eq!(d.sessions().get("default").await.last_result_set.len(), 2);
}

#[tokio::test]
async fn route_queries_follow_directions() {
    let (d, mut rx) = wired();

    assert_eq!(
        d.dispatch("default", speech("get_trip_duration", 0.9)).await,
        DispatchOutcome::NoActiveContext {
            intent: "get_trip_duration".to_owned(),
            requirement: ContextRequirement::ActiveRoute,
        }
    );

    d.dispatch("default", speech("get_directions", 0.9)).await;
    // Read-only queries run directly in the medium band.
    assert_eq!(
        d.dispatch("default", speech("get_trip_duration", 0.65)).await,
        DispatchOutcome::Executed {
            intent: "get_trip_duration".to_owned(),
            confirmed: false,
        }
    );

    // The automation layer can still report that the route vanished.
    assert_eq!(
        d.dispatch("default", speech("swap_route", 0.9)).await,
        DispatchOutcome::NoActiveContext {
            intent: "swap_route".to_owned(),
            requirement: ContextRequirement::ActiveRoute,
        }
    );
    let texts: Vec<_> = drain(&mut rx).into_iter().map(|m| m.text).collect();
    assert_eq!(
        texts.last().unwrap(),
        messages::no_active_context(ContextRequirement::ActiveRoute)
    );
}

#[tokio::test]
async fn every_gesture_command_reaches_automation() {
    let (d, _rx) = wired();
    let commands: Vec<_> = GESTURE_TABLE
        .iter()
        .filter(|m| m.kind == GestureKind::Command)
        .collect();
    assert_eq!(commands.len(), 15);
    for mapping in commands {
        let outcome = d.handle_raw(&format!("[GESTURES][{}]", mapping.code)).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Executed {
                intent: mapping.intent.to_owned(),
                confirmed: false,
            },
            "{}",
            mapping.code
        );
    }
}

#[tokio::test]
async fn find_place_is_served_like_search() {
    let (d, mut rx) = wired();
    let raw = r#"{"intent":"find_place","confidence":0.95,"entities":[{"entity":"query","value":"farmácia"}]}"#;
    assert_eq!(
        d.handle_raw(raw).await,
        DispatchOutcome::Executed {
            intent: "find_place".to_owned(),
            confirmed: false,
        }
    );
    assert_eq!(d.sessions().get("default").await.last_result_set.len(), 2);
    assert_eq!(drain(&mut rx)[0].text, "ok find_place");

    assert_eq!(
        d.dispatch("default", speech("find_place", 0.72)).await,
        DispatchOutcome::AwaitingConfirmation {
            intent: "find_place".to_owned(),
            lower_certainty: false,
        }
    );
}
