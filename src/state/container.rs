use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, trace};

use crate::clock::TickEvent;
use crate::display::DisplayError;
use crate::state::model::{ApplicationState, Command, Effect};
use crate::state::persist::{self, KeyValueStore};
use crate::state::view::{DerivedViewModel, derive_view};
use crate::template::{MessageError, MessageRenderer, render_message};
use crate::time_zone::ZoneFormatter;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RenderReason {
    Load,
    Tick,
    Mutation,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: ApplicationState,
    pub now_ms: i64,
    pub viewer_zone: String,
    pub view: Result<DerivedViewModel, DisplayError>,
}

impl Snapshot {
    pub fn render_message(&self, renderer: &dyn MessageRenderer) -> Result<String, MessageError> {
        render_message(renderer, &self.state.message_format, &self.view)
    }
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub reason: RenderReason,
    pub snapshot: Snapshot,
}

pub struct StateContainer {
    state: ApplicationState,
    store: Box<dyn KeyValueStore>,
    formatter: Arc<dyn ZoneFormatter>,
    viewer_zone: String,
    now_ms: i64,
    view: Result<DerivedViewModel, DisplayError>,
    observers: Vec<Sender<RenderRequest>>,
}

impl StateContainer {
    pub fn new(
        store: Box<dyn KeyValueStore>,
        formatter: Arc<dyn ZoneFormatter>,
        viewer_zone: impl Into<String>,
    ) -> Result<Self> {
        Self::new_with_now(store, formatter, viewer_zone, Utc::now().timestamp_millis())
    }

    pub fn new_with_now(
        store: Box<dyn KeyValueStore>,
        formatter: Arc<dyn ZoneFormatter>,
        viewer_zone: impl Into<String>,
        now_ms: i64,
    ) -> Result<Self> {
        let state = persist::load(store.as_ref())?;
        debug!(
            time_zones = state.time_zones.len(),
            "loaded application state"
        );
        let viewer_zone = viewer_zone.into();
        let view = derive_view(&state, now_ms, &viewer_zone, formatter.as_ref());
        Ok(Self {
            state,
            store,
            formatter,
            viewer_zone,
            now_ms,
            view,
            observers: Vec::new(),
        })
    }

    pub fn state(&self) -> &ApplicationState {
        &self.state
    }

    pub fn view(&self) -> Result<&DerivedViewModel, &DisplayError> {
        self.view.as_ref()
    }

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn viewer_zone(&self) -> &str {
        &self.viewer_zone
    }

    pub fn formatter(&self) -> &Arc<dyn ZoneFormatter> {
        &self.formatter
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            now_ms: self.now_ms,
            viewer_zone: self.viewer_zone.clone(),
            view: self.view.clone(),
        }
    }

    pub fn subscribe_renders(&mut self) -> Receiver<RenderRequest> {
        let (tx, rx) = channel();
        let _ = tx.send(RenderRequest {
            reason: RenderReason::Load,
            snapshot: self.snapshot(),
        });
        self.observers.push(tx);
        rx
    }

    pub fn apply(&mut self, command: Command) -> Result<()> {
        let effect = self.state.apply(command);
        let saved = match effect {
            Effect::Persist => persist::save(self.store.as_ref(), &self.state),
            Effect::Transient | Effect::Unchanged => Ok(()),
        };
        self.refresh(RenderReason::Mutation);
        saved
    }

    pub fn add_time_zone(&mut self, time_zone: &str) -> Result<()> {
        self.apply(Command::AddTimeZone(time_zone.to_string()))
    }

    pub fn rename_entry(&mut self, index: usize, label: impl Into<String>) -> Result<()> {
        self.apply(Command::RenameEntry {
            index,
            label: label.into(),
        })
    }

    pub fn delete_entry(&mut self, index: usize) -> Result<()> {
        self.apply(Command::DeleteEntry(index))
    }

    pub fn set_user_label(&mut self, label: impl Into<String>) -> Result<()> {
        self.apply(Command::SetUserLabel(label.into()))
    }

    pub fn set_message_format(&mut self, format: impl Into<String>) -> Result<()> {
        self.apply(Command::SetMessageFormat(format.into()))
    }

    pub fn set_custom_date_time(&mut self, enabled: bool, value: Option<String>) -> Result<()> {
        self.apply(Command::SetCustomDateTime { enabled, value })
    }

    pub fn on_tick(&mut self, event: TickEvent) {
        trace!(timestamp = event.timestamp, "state container tick");
        self.now_ms = event.timestamp;
        self.refresh(RenderReason::Tick);
    }

    fn refresh(&mut self, reason: RenderReason) {
        self.view = derive_view(
            &self.state,
            self.now_ms,
            &self.viewer_zone,
            self.formatter.as_ref(),
        );
        if self.observers.is_empty() {
            return;
        }
        let request = RenderRequest {
            reason,
            snapshot: self.snapshot(),
        };
        self.observers
            .retain(|observer| observer.send(request.clone()).is_ok());
    }
}
