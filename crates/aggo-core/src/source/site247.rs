use serde::{Deserialize, Serialize};

use crate::event::Event;

pub const SITE247_SOURCE: &str = "site247";

/// Alert body posted by a Site24x7 monitor webhook. Every field is optional;
/// absent ones are omitted again when the alert is re-serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site247Alert {
    #[serde(rename = "MONITORNAME", default, skip_serializing_if = "String::is_empty")]
    pub monitor_name: String,
    #[serde(rename = "MONITOR_GROUPNAME", default, skip_serializing_if = "String::is_empty")]
    pub monitor_group_name: String,
    #[serde(rename = "SEARCH POLLFREQUENCY", default, skip_serializing_if = "is_zero")]
    pub search_poll_frequency: i64,
    #[serde(rename = "MONITOR_ID", default, skip_serializing_if = "is_zero")]
    pub monitor_id: i64,
    #[serde(rename = "FAILED_LOCATIONS", default, skip_serializing_if = "String::is_empty")]
    pub failed_locations: String,
    #[serde(rename = "MONITORURL", default, skip_serializing_if = "String::is_empty")]
    pub monitor_url: String,
    #[serde(rename = "INCIDENT_TIME_ISO", default, skip_serializing_if = "String::is_empty")]
    pub incident_time_iso: String,
    #[serde(rename = "MONITORTYPE", default, skip_serializing_if = "String::is_empty")]
    pub monitor_type: String,
    #[serde(rename = "STATUS", default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(rename = "TIMEZONE", default, skip_serializing_if = "String::is_empty")]
    pub timezone: String,
    #[serde(rename = "INCIDENT_TIME", default, skip_serializing_if = "String::is_empty")]
    pub incident_time: String,
    #[serde(rename = "INCIDENT_REASON", default, skip_serializing_if = "String::is_empty")]
    pub incident_reason: String,
    #[serde(rename = "OUTAGE_TIME_UNIX_FORMAT", default, skip_serializing_if = "is_zero")]
    pub outage_time_unix_format: i64,
    #[serde(rename = "RCA_LINK", default, skip_serializing_if = "String::is_empty")]
    pub rca_link: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// Event type `site247.<group>.<monitor>`, stamped with the current time.
pub fn event_from_site247(alert: Site247Alert) -> Event {
    let event_type = format!(
        "{SITE247_SOURCE}.{}.{}",
        alert.monitor_group_name, alert.monitor_name
    );
    let payload = serde_json::to_value(&alert).unwrap_or_default();
    Event::new(event_type, payload).with_source(SITE247_SOURCE)
}
