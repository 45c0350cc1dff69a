//! Configuration files driving the gate and the registry.

use crate::helpers::{Effect, Recording, dispatcher_with_config, speech};
use mmi_dispatch::catalog::register_catalog;
use mmi_dispatch::config::{FeedbackFormat, SessionIdSource};
use mmi_dispatch::registry::Capability;
use mmi_dispatch::{
    CapabilityRegistration, ConfirmPolicy, DispatchConfig, DispatchOutcome, RegistryBuilder,
};
use std::sync::Arc;

const CONFIG: &str = r#"
[confidence]
high = 0.9
medium = 0.7
low = 0.5

[confirmation]
timeout_ms = 8000
affirm_intents = ["affirm", "yes"]

[confirmation.overrides]
zoom_in = "always"
teleport = "direct"

[feedback]
format = "mmi"

[session]
id_source = "mmi_context"
"#;

fn load() -> (DispatchConfig, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, CONFIG).unwrap();
    (DispatchConfig::from_file(&path).unwrap(), dir)
}

#[test]
fn file_values_override_defaults() {
    let (config, _dir) = load();
    config.validate().unwrap();
    assert!((config.confidence.high - 0.9).abs() < f32::EPSILON);
    assert_eq!(config.confirmation.timeout_ms, 8000);
    assert_eq!(config.confirmation.deny_intents, vec!["deny"]);
    assert_eq!(config.feedback.format, FeedbackFormat::Mmi);
    assert_eq!(config.session.id_source, SessionIdSource::MmiContext);
    assert_eq!(config.feedback.language, "pt-PT");
}

#[test]
fn overrides_apply_to_catalog_and_report_unknown_intents() {
    struct Noop;

    #[async_trait::async_trait]
    impl Capability for Noop {
        async fn execute(
            &self,
            _entities: &[mmi_dispatch::Entity],
            _context: &mut mmi_dispatch::ContextHandle,
        ) -> Result<mmi_dispatch::CapabilityOutcome, mmi_dispatch::CapabilityError> {
            Ok(mmi_dispatch::CapabilityOutcome::success(""))
        }
    }

    let (config, _dir) = load();
    let mut builder = RegistryBuilder::new();
    register_catalog(&mut builder, |_| Arc::new(Noop) as Arc<dyn Capability>).unwrap();
    let unknown = builder.apply_overrides(&config.confirmation.overrides);
    assert_eq!(unknown, vec!["teleport"]);
    let registry = builder.build();
    assert_eq!(
        registry.lookup("zoom_in").unwrap().policy,
        ConfirmPolicy::Always
    );
}

#[tokio::test]
async fn configured_thresholds_and_vocabulary_drive_the_gate() {
    let (config, _dir) = load();
    let zoom = Recording::new("ok", Effect::Nothing);
    let (d, _rx) = dispatcher_with_config(
        vec![CapabilityRegistration::new("zoom_out", zoom.clone())],
        &config,
    );

    // 0.85 is below the configured HIGH of 0.9.
    assert!(matches!(
        d.dispatch("default", speech("zoom_out", 0.85)).await,
        DispatchOutcome::AwaitingConfirmation { .. }
    ));
    assert!(matches!(
        d.dispatch("default", speech("yes", 0.9)).await,
        DispatchOutcome::Executed {
            confirmed: true,
            ..
        }
    ));
    // 0.45 is below the configured LOW of 0.5.
    assert!(matches!(
        d.dispatch("default", speech("zoom_out", 0.45)).await,
        DispatchOutcome::Discarded { .. }
    ));
    assert_eq!(zoom.calls(), 1);
}

#[tokio::test]
async fn mmi_context_selects_the_session() {
    let (config, _dir) = load();
    let zoom = Recording::new("ok", Effect::Nothing);
    let (d, _rx) = dispatcher_with_config(
        vec![CapabilityRegistration::new("zoom_in", zoom.clone())],
        &config,
    );

    let pending = crate::helpers::notification(
        "ctx-42",
        r#"{"recognized":["SPEECH"],"nlu":{"intent":{"name":"zoom_in","confidence":0.8}}}"#,
    );
    assert!(matches!(
        d.handle_raw(&pending).await,
        DispatchOutcome::AwaitingConfirmation { .. }
    ));
    assert!(d.pending("ctx-42").is_some());
    assert!(d.pending("default").is_none());
}
