//! Bridge from capabilities to an external UI-automation process.
//!
//! Each [`AutomationCapability`] forwards its invocation as an
//! [`AutomationRequest`] over a bounded channel and waits, with a timeout, for
//! the matching [`AutomationReply`]. [`stdio`] serves that channel as
//! newline-delimited JSON so the automation layer can live in any process.

pub mod stdio;

use crate::intent::Entity;
use crate::registry::{Capability, CapabilityError, CapabilityOutcome};
use crate::session::{ContextHandle, ContextPatch, ContextRequirement, SessionContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// One capability invocation for the automation layer.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationRequest {
    pub id: String,
    pub session_id: String,
    pub intent: String,
    pub entities: Vec<Entity>,
    /// Context as the capability sees it.
    pub context: SessionContext,
}

/// Result from the automation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationReply {
    pub id: String,
    pub success: bool,
    pub message: String,
    /// Context changes to commit if `success`.
    pub context: Option<ContextPatch>,
    /// Set when the action needed context that does not exist.
    pub missing_context: Option<ContextRequirement>,
}

/// Request plus the channel its reply goes back on.
#[derive(Debug)]
pub struct PendingAutomation {
    pub request: AutomationRequest,
    respond_to: oneshot::Sender<AutomationReply>,
}

impl PendingAutomation {
    pub fn respond(self, reply: AutomationReply) {
        let _ = self.respond_to.send(reply);
    }

    pub(crate) fn into_parts(self) -> (AutomationRequest, oneshot::Sender<AutomationReply>) {
        (self.request, self.respond_to)
    }
}

/// Sending half shared by all automation capabilities.
#[derive(Debug, Clone)]
pub struct AutomationClient {
    tx: mpsc::Sender<PendingAutomation>,
    timeout: Duration,
}

/// Client plus the stream of requests to serve.
#[must_use]
pub fn channel(
    queue_size: usize,
    timeout: Duration,
) -> (AutomationClient, mpsc::Receiver<PendingAutomation>) {
    let (tx, rx) = mpsc::channel(queue_size.max(1));
    (AutomationClient { tx, timeout }, rx)
}

impl AutomationClient {
    /// Capability that forwards `intent` to the automation layer.
    #[must_use]
    pub fn capability(&self, intent: impl Into<String>) -> AutomationCapability {
        AutomationCapability {
            intent: intent.into(),
            client: self.clone(),
        }
    }

    async fn invoke(&self, request: AutomationRequest) -> Result<AutomationReply, CapabilityError> {
        let (respond_to, reply_rx) = oneshot::channel();
        let id = request.id.clone();
        self.tx
            .send(PendingAutomation {
                request,
                respond_to,
            })
            .await
            .map_err(|_| CapabilityError::Failed("automation layer is unavailable".to_owned()))?;

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(CapabilityError::Failed(format!(
                "automation reply channel closed for request {id}"
            ))),
            Err(_) => Err(CapabilityError::Failed(format!(
                "automation request {id} timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

/// Capability executed by the external automation layer.
#[derive(Debug, Clone)]
pub struct AutomationCapability {
    intent: String,
    client: AutomationClient,
}

#[async_trait]
impl Capability for AutomationCapability {
    async fn execute(
        &self,
        entities: &[Entity],
        context: &mut ContextHandle,
    ) -> Result<CapabilityOutcome, CapabilityError> {
        let request = AutomationRequest {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: context.session_id().to_owned(),
            intent: self.intent.clone(),
            entities: entities.to_vec(),
            context: context.get().clone(),
        };
        let reply = self.client.invoke(request).await?;

        if let Some(requirement) = reply.missing_context {
            return Err(CapabilityError::NoActiveContext(requirement));
        }
        if reply.success
            && let Some(patch) = reply.context
        {
            context.update(|ctx| patch.apply(ctx));
        }
        Ok(CapabilityOutcome {
            success: reply.success,
            message: reply.message,
        })
    }
}
