use crate::db;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::manager::{ScheduleError, ScheduleStateManager, TransitionPolicy};
use crate::schedule::RawWeek;
use rusqlite::Connection;
use serde_json::{json, Value as JsonValue};

pub const SETUP_TIMETABLE_KEY: &str = "setup.timetable";

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, JsonValue> {
    state
        .db
        .as_ref()
        .ok_or_else(|| no_workspace(req))
}

pub fn no_workspace(req: &Request) -> JsonValue {
    err(&req.id, "no_workspace", "select a workspace first", None)
}

pub fn no_session(req: &Request, teacher_id: &str) -> JsonValue {
    err(
        &req.id,
        "no_session",
        format!("no open timetable for {}", teacher_id),
        Some(json!({ "teacherId": teacher_id })),
    )
}

pub fn required_str(req: &Request, key: &str) -> Result<String, JsonValue> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Trimmed string param; absent, null or non-string values read as `None`.
pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
}

pub fn required_index(req: &Request, key: &str) -> Result<usize, JsonValue> {
    req.params
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a non-negative integer", key),
                None,
            )
        })
}

/// `None` when the key is absent or null.
pub fn optional_raw_timetable(
    req: &Request,
    key: &str,
) -> Result<Option<Vec<RawWeek>>, JsonValue> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => serde_json::from_value::<Vec<RawWeek>>(v.clone())
            .map(Some)
            .map_err(|e| {
                err(
                    &req.id,
                    "bad_params",
                    format!("{} must be an array of weeks: {}", key, e),
                    None,
                )
            }),
    }
}

/// The stored `setup.timetable` object. Unreadable or non-object values are
/// logged and treated as empty.
pub fn load_setup_section(conn: &Connection) -> serde_json::Map<String, JsonValue> {
    match db::settings_get_json(conn, SETUP_TIMETABLE_KEY) {
        Ok(Some(JsonValue::Object(section))) => section,
        Ok(Some(other)) => {
            tracing::warn!(key = SETUP_TIMETABLE_KEY, value = %other, "setup section is not an object, ignoring it");
            serde_json::Map::new()
        }
        Ok(None) => serde_json::Map::new(),
        Err(e) => {
            tracing::warn!(key = SETUP_TIMETABLE_KEY, error = %format!("{e:#}"), "could not read setup section, using defaults");
            serde_json::Map::new()
        }
    }
}

pub fn load_transition_policy(conn: &Connection) -> TransitionPolicy {
    let Some(value) = load_setup_section(conn).remove("statusTransitions") else {
        return TransitionPolicy::default();
    };
    serde_json::from_value(value.clone()).unwrap_or_else(|e| {
        tracing::warn!(value = %value, error = %e, "unknown statusTransitions setting, using default");
        TransitionPolicy::default()
    })
}

pub fn schedule_err(req: &Request, e: &ScheduleError) -> JsonValue {
    let details = match e {
        ScheduleError::InvalidReference { week, day, slot } => Some(json!({
            "weekIndex": week,
            "dayIndex": day,
            "slotIndex": slot,
        })),
        ScheduleError::InvalidTransition { from, to } => Some(json!({
            "from": from,
            "to": to,
        })),
        _ => None,
    };
    err(&req.id, e.code(), e.to_string(), details)
}

pub fn timetable_view(teacher_id: &str, manager: &ScheduleStateManager) -> JsonValue {
    json!({
        "teacherId": teacher_id,
        "weeks": manager.schedule(),
        "pending": manager.pending_view(),
        "stats": manager.stats(),
        "hasChanges": manager.has_pending_changes(),
        "commitInFlight": manager.commit_in_flight(),
        "statusTransitions": manager.policy(),
    })
}
