use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::omr::{self, NewOmrResult};
use serde_json::{json, Value as JsonValue};

fn handle_create(state: &mut AppState, req: &Request) -> JsonValue {
    let answers = match req.params.get("omrResults") {
        None | Some(JsonValue::Null) => {
            return err(&req.id, "bad_params", "missing omrResults", None)
        }
        Some(raw) => match omr::map_answers(raw) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
        },
    };
    let success = match req.params.get("success") {
        None | Some(JsonValue::Null) => false,
        Some(v) => match v.as_bool() {
            Some(b) => b,
            None => return err(&req.id, "bad_params", "success must be a boolean", None),
        },
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let new = NewOmrResult {
        user_id: optional_str(req, "userId").unwrap_or_default(),
        username: optional_str(req, "username").unwrap_or_default(),
        assignment_id: optional_str(req, "assignmentId").unwrap_or_default(),
        assignment_topic: optional_str(req, "assignmentTopic").unwrap_or_default(),
        success,
        answers,
        timestamp: optional_str(req, "timestamp").filter(|s| !s.is_empty()),
    };
    match omr::insert_result(conn, new) {
        Ok(result) => ok(&req.id, json!(result)),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            format!("{e:#}"),
            Some(json!({ "table": "omr_results" })),
        ),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = optional_str(req, "assignmentId").filter(|s| !s.is_empty());
    match omr::list_results(conn, assignment_id.as_deref()) {
        Ok(results) => ok(&req.id, json!({ "results": results })),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> JsonValue {
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match omr::get_result(conn, &id) {
        Ok(Some(result)) => ok(&req.id, json!(result)),
        Ok(None) => err(
            &req.id,
            "not_found",
            "omr result not found",
            Some(json!({ "id": id })),
        ),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "omr.create" => Some(handle_create(state, req)),
        "omr.list" => Some(handle_list(state, req)),
        "omr.get" => Some(handle_get(state, req)),
        _ => None,
    }
}
