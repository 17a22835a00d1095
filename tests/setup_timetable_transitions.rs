mod test_support;

use serde_json::json;
use test_support::{one_week_timetable, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn forward_only_policy_blocks_backward_status_moves() {
    let workspace = temp_dir("timetabled-policy");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "timetable.open",
        json!({ "teacherId": "T-3", "timetable": one_week_timetable() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.timetable.update",
        json!({ "patch": { "statusTransitions": "forwardOnly" } }),
    );
    let setup = request_ok(&mut stdin, &mut reader, "4", "setup.timetable.get", json!({}));
    assert_eq!(setup["statusTransitions"], json!("forwardOnly"));

    // Applies to the already open session.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "timetable.slots.setStatus",
        json!({ "teacherId": "T-3", "weekIndex": 0, "dayIndex": 0, "slotIndex": 0, "status": "Completed" }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "timetable.slots.setStatus",
        json!({ "teacherId": "T-3", "weekIndex": 0, "dayIndex": 0, "slotIndex": 0, "status": "Conducted" }),
    );
    assert_eq!(code, "invalid_transition");

    // And to sessions opened later.
    let view = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "timetable.open",
        json!({ "teacherId": "T-4", "timetable": one_week_timetable() }),
    );
    assert_eq!(view["statusTransitions"], json!("forwardOnly"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "setup.timetable.update",
        json!({ "patch": { "statusTransitions": "free" } }),
    );
    let back = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "timetable.slots.setStatus",
        json!({ "teacherId": "T-3", "weekIndex": 0, "dayIndex": 0, "slotIndex": 0, "status": "Pending" }),
    );
    assert_eq!(back["hasChanges"], json!(false));
}

#[test]
fn setup_update_rejects_unknown_values() {
    let workspace = temp_dir("timetabled-policy-bad");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "setup.timetable.update",
        json!({ "patch": { "statusTransitions": "backwardOnly" } }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "setup.timetable.update",
        json!({ "patch": { "colour": "red" } }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "setup.timetable.update",
        json!({}),
    );
    assert_eq!(code, "bad_params");
    let setup = request_ok(&mut stdin, &mut reader, "5", "setup.timetable.get", json!({}));
    assert_eq!(setup["statusTransitions"], json!("free"));
}
