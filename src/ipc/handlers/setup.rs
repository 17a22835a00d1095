use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, load_setup_section, load_transition_policy, no_workspace, SETUP_TIMETABLE_KEY,
};
use crate::ipc::types::{AppState, Request};
use crate::manager::TransitionPolicy;
use serde_json::{json, Value as JsonValue};

fn handle_get(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let policy = load_transition_policy(conn);
    ok(&req.id, json!({ "statusTransitions": policy }))
}

fn handle_update(state: &mut AppState, req: &Request) -> JsonValue {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch", None);
    };

    let mut section = load_setup_section(conn);

    let mut new_policy = None;
    for (key, value) in patch {
        match key.as_str() {
            "statusTransitions" => {
                match serde_json::from_value::<TransitionPolicy>(value.clone()) {
                    Ok(p) => new_policy = Some(p),
                    Err(_) => {
                        return err(
                            &req.id,
                            "bad_params",
                            "statusTransitions must be \"free\" or \"forwardOnly\"",
                            None,
                        )
                    }
                }
            }
            other => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown setup.timetable field: {}", other),
                    None,
                )
            }
        }
    }

    if let Some(p) = new_policy {
        section.insert("statusTransitions".to_string(), json!(p));
    }
    if let Err(e) = db::settings_set_json(conn, SETUP_TIMETABLE_KEY, &JsonValue::Object(section)) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    if let Some(p) = new_policy {
        for manager in state.sessions.values_mut() {
            manager.set_policy(p);
        }
        tracing::info!(policy = ?p, "status transition policy updated");
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "setup.timetable.get" => Some(handle_get(state, req)),
        "setup.timetable.update" => Some(handle_update(state, req)),
        _ => None,
    }
}
