//! Per-session conversational context.
//!
//! Each session owns one [`SessionContext`] behind an async mutex. Holding that
//! mutex is the session's execution lock: capabilities run while it is held and
//! only see a staged copy through [`ContextHandle`], which the dispatcher commits
//! after a successful invocation.

use crate::entities::TransportMode;
use crate::registry::CapabilityError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Opaque reference to a place shown by the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl PlaceRef {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Opaque reference to the route currently shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRef {
    #[serde(default)]
    pub origin: Option<String>,
    pub destination: String,
    #[serde(default)]
    pub mode: Option<TransportMode>,
}

/// Which side panel the map view is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapPanelState {
    #[default]
    None,
    SearchResults,
    Directions,
    PlaceDetails,
}

/// Cross-turn state for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Places from the most recent listing, in display order.
    pub last_result_set: Vec<PlaceRef>,
    pub active_route: Option<RouteRef>,
    pub map_panel_state: MapPanelState,
    pub selected_place: Option<PlaceRef>,
    pub last_query: Option<String>,
}

impl SessionContext {
    /// Place at a 1-based rank in the last result set.
    #[must_use]
    pub fn place_at(&self, rank: u32) -> Option<&PlaceRef> {
        let index = usize::try_from(rank).ok()?.checked_sub(1)?;
        self.last_result_set.get(index)
    }

    #[must_use]
    pub fn satisfies(&self, requirement: ContextRequirement) -> bool {
        match requirement {
            ContextRequirement::ResultSet => !self.last_result_set.is_empty(),
            ContextRequirement::ActiveRoute => self.active_route.is_some(),
            ContextRequirement::SelectedPlace => self.selected_place.is_some(),
        }
    }
}

/// Prior context a capability cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextRequirement {
    ResultSet,
    ActiveRoute,
    SelectedPlace,
}

impl fmt::Display for ContextRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ResultSet => "no result set has been shown",
            Self::ActiveRoute => "no route is active",
            Self::SelectedPlace => "no place is selected",
        })
    }
}

/// Partial update produced outside the process (e.g. by the automation bridge).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextPatch {
    pub last_result_set: Option<Vec<PlaceRef>>,
    pub active_route: Option<RouteRef>,
    /// Drop the active route (applied before `active_route`).
    pub clear_route: bool,
    pub map_panel_state: Option<MapPanelState>,
    pub selected_place: Option<PlaceRef>,
    pub last_query: Option<String>,
}

impl ContextPatch {
    pub fn apply(self, context: &mut SessionContext) {
        if let Some(results) = self.last_result_set {
            context.last_result_set = results;
        }
        if self.clear_route {
            context.active_route = None;
        }
        if let Some(route) = self.active_route {
            context.active_route = Some(route);
        }
        if let Some(panel) = self.map_panel_state {
            context.map_panel_state = panel;
        }
        if let Some(place) = self.selected_place {
            context.selected_place = Some(place);
        }
        if let Some(query) = self.last_query {
            context.last_query = Some(query);
        }
    }
}

/// Per-invocation view of a session's context.
///
/// Changes are staged; the dispatcher commits them only when the capability
/// succeeds.
#[derive(Debug)]
pub struct ContextHandle {
    session_id: String,
    staged: SessionContext,
    dirty: bool,
}

impl ContextHandle {
    pub(crate) fn new(session_id: impl Into<String>, snapshot: SessionContext) -> Self {
        Self {
            session_id: session_id.into(),
            staged: snapshot,
            dirty: false,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn get(&self) -> &SessionContext {
        &self.staged
    }

    pub fn update(&mut self, mutator: impl FnOnce(&mut SessionContext)) {
        mutator(&mut self.staged);
        self.dirty = true;
    }

    /// Record an ordered listing so later ordinal selection resolves against it.
    pub fn record_results(&mut self, places: Vec<PlaceRef>, query: Option<String>) {
        self.update(|ctx| {
            ctx.last_result_set = places;
            ctx.map_panel_state = MapPanelState::SearchResults;
            ctx.selected_place = None;
            if query.is_some() {
                ctx.last_query = query;
            }
        });
    }

    /// # Errors
    ///
    /// [`CapabilityError::NoActiveContext`] when the requirement is not met.
    pub fn require(&self, requirement: ContextRequirement) -> Result<(), CapabilityError> {
        if self.staged.satisfies(requirement) {
            Ok(())
        } else {
            Err(CapabilityError::NoActiveContext(requirement))
        }
    }

    pub(crate) fn into_changes(self) -> Option<SessionContext> {
        self.dirty.then_some(self.staged)
    }
}

/// Context plus execution lock for one session.
#[derive(Debug, Default)]
pub struct SessionSlot {
    context: tokio::sync::Mutex<SessionContext>,
}

impl SessionSlot {
    /// Acquire the session's execution lock.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, SessionContext> {
        self.context.lock().await
    }
}

/// All sessions seen by this process. Sessions are never removed.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<SessionSlot>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `session_id`, created on first access.
    pub fn slot(&self, session_id: &str) -> Arc<SessionSlot> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            sessions
                .entry(session_id.to_owned())
                .or_insert_with(|| Arc::new(SessionSlot::default())),
        )
    }

    /// Snapshot of a session's context (created on first access).
    pub async fn get(&self, session_id: &str) -> SessionContext {
        self.slot(session_id).lock().await.clone()
    }

    /// Mutate a session's context under its execution lock.
    pub async fn update(&self, session_id: &str, mutator: impl FnOnce(&mut SessionContext)) {
        let slot = self.slot(session_id);
        let mut guard = slot.lock().await;
        mutator(&mut guard);
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
