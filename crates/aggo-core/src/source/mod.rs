//! Adapters that turn third-party payloads into [`Event`]s.

pub mod site247;

use serde::Deserialize;

use crate::event::Event;

pub use site247::{Site247Alert, event_from_site247};

/// One inbound record: either a ready-made event or a payload wrapped under
/// the key of the adapter that understands it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SourceRecord {
    Site247 { site247: Site247Alert },
    Event(Event),
}

impl SourceRecord {
    pub fn into_event(self) -> Event {
        match self {
            Self::Site247 { site247 } => event_from_site247(site247),
            Self::Event(event) => event,
        }
    }
}
