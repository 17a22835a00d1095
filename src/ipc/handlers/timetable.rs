use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, load_transition_policy, no_session, no_workspace, optional_raw_timetable,
    required_index, required_str, schedule_err, timetable_view,
};
use crate::ipc::types::{AppState, Request};
use crate::manager::{CommitOutcome, ScheduleStateManager, TransitionPolicy};
use crate::schedule::SlotStatus;
use crate::store::{SqliteTimetableStore, TimetableStore};
use serde_json::{json, Value as JsonValue};

fn session_policy(state: &AppState) -> TransitionPolicy {
    state
        .db
        .as_ref()
        .map(load_transition_policy)
        .unwrap_or_default()
}

/// Installs `manager` as the open session, dropping any previous one.
fn replace_session(
    state: &mut AppState,
    teacher_id: &str,
    manager: ScheduleStateManager,
    action: &str,
) {
    if let Some(previous) = state.sessions.insert(teacher_id.to_string(), manager) {
        if previous.has_pending_changes() {
            tracing::info!(teacher_id = %teacher_id, action, "replaced timetable, unsaved edits discarded");
        } else {
            tracing::debug!(teacher_id = %teacher_id, action, "replaced open timetable");
        }
    }
}

/// Stores a freshly generated timetable and opens it.
fn handle_import(state: &mut AppState, req: &Request) -> JsonValue {
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let raw = match optional_raw_timetable(req, "timetable") {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing timetable", None),
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let mut manager = ScheduleStateManager::new(load_transition_policy(conn));
    manager.load(raw);
    let mut store = SqliteTimetableStore::new(conn);
    if let Err(e) = store.save(&teacher_id, &manager.schedule().to_payload()) {
        return err(&req.id, "db_update_failed", format!("{e:#}"), None);
    }

    let view = timetable_view(&teacher_id, &manager);
    replace_session(state, &teacher_id, manager, "import");
    ok(&req.id, view)
}

/// Opens either the timetable passed in or the stored one.
fn handle_open(state: &mut AppState, req: &Request) -> JsonValue {
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let raw = match optional_raw_timetable(req, "timetable") {
        Ok(Some(v)) => v,
        Ok(None) => {
            let conn = match db_conn(state, req) {
                Ok(c) => c,
                Err(e) => return e,
            };
            match SqliteTimetableStore::new(conn).load(&teacher_id) {
                Ok(Some(v)) => v,
                Ok(None) => {
                    return err(
                        &req.id,
                        "not_found",
                        format!("no stored timetable for {}", teacher_id),
                        None,
                    )
                }
                Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
            }
        }
        Err(e) => return e,
    };

    let mut manager = ScheduleStateManager::new(session_policy(state));
    manager.load(raw);
    let view = timetable_view(&teacher_id, &manager);
    replace_session(state, &teacher_id, manager, "open");
    ok(&req.id, view)
}

fn with_session(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&str, &ScheduleStateManager) -> JsonValue,
) -> JsonValue {
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.sessions.get(&teacher_id) {
        Some(m) => ok(&req.id, f(&teacher_id, m)),
        None => no_session(req, &teacher_id),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> JsonValue {
    with_session(state, req, timetable_view)
}

fn handle_pending(state: &mut AppState, req: &Request) -> JsonValue {
    with_session(state, req, |_, m| json!({ "weeks": m.pending_view() }))
}

fn handle_stats(state: &mut AppState, req: &Request) -> JsonValue {
    with_session(state, req, |_, m| json!(m.stats()))
}

fn handle_set_status(state: &mut AppState, req: &Request) -> JsonValue {
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let week = match required_index(req, "weekIndex") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let day = match required_index(req, "dayIndex") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let slot = match required_index(req, "slotIndex") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let status = match required_str(req, "status").map(|s| SlotStatus::parse(&s)) {
        Ok(Some(s)) => s,
        Ok(None) => {
            return err(
                &req.id,
                "bad_params",
                "status must be Pending, Conducted or Completed",
                None,
            )
        }
        Err(e) => return e,
    };

    let Some(manager) = state.sessions.get_mut(&teacher_id) else {
        return no_session(req, &teacher_id);
    };
    if let Err(e) = manager.update_slot_status(week, day, slot, status) {
        return schedule_err(req, &e);
    }
    ok(
        &req.id,
        json!({
            "hasChanges": manager.has_pending_changes(),
            "stats": manager.stats(),
        }),
    )
}

fn handle_save(state: &mut AppState, req: &Request) -> JsonValue {
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let Some(manager) = state.sessions.get_mut(&teacher_id) else {
        return no_session(req, &teacher_id);
    };

    let mut store = SqliteTimetableStore::new(conn);
    match manager.commit(&teacher_id, &mut store) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "saved": outcome == CommitOutcome::Saved,
                "hasChanges": manager.has_pending_changes(),
            }),
        ),
        Err(e) => schedule_err(req, &e),
    }
}

fn handle_close(state: &mut AppState, req: &Request) -> JsonValue {
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let closed = match state.sessions.remove(&teacher_id) {
        Some(m) => {
            if m.has_pending_changes() {
                tracing::info!(teacher_id = %teacher_id, "closed timetable with unsaved edits");
            }
            true
        }
        None => false,
    };
    ok(&req.id, json!({ "closed": closed }))
}

fn handle_list(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let stored = match SqliteTimetableStore::new(conn).list() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    let timetables: Vec<JsonValue> = stored
        .into_iter()
        .map(|t| {
            let open = state.sessions.contains_key(&t.teacher_id);
            json!({
                "teacherId": t.teacher_id,
                "updatedAt": t.updated_at,
                "open": open,
            })
        })
        .collect();
    ok(&req.id, json!({ "timetables": timetables }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "timetable.import" => Some(handle_import(state, req)),
        "timetable.open" => Some(handle_open(state, req)),
        "timetable.get" => Some(handle_get(state, req)),
        "timetable.pending" => Some(handle_pending(state, req)),
        "timetable.stats" => Some(handle_stats(state, req)),
        "timetable.slots.setStatus" => Some(handle_set_status(state, req)),
        "timetable.save" => Some(handle_save(state, req)),
        "timetable.close" => Some(handle_close(state, req)),
        "timetable.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
