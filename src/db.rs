use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "timetabled.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetables(
            teacher_id TEXT PRIMARY KEY,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_weeks(
            teacher_id TEXT NOT NULL,
            week_index INTEGER NOT NULL,
            week_number INTEGER NOT NULL,
            PRIMARY KEY(teacher_id, week_index),
            FOREIGN KEY(teacher_id) REFERENCES timetables(teacher_id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_days(
            teacher_id TEXT NOT NULL,
            week_index INTEGER NOT NULL,
            day_index INTEGER NOT NULL,
            day TEXT NOT NULL,
            PRIMARY KEY(teacher_id, week_index, day_index),
            FOREIGN KEY(teacher_id, week_index)
                REFERENCES timetable_weeks(teacher_id, week_index) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_slots(
            teacher_id TEXT NOT NULL,
            week_index INTEGER NOT NULL,
            day_index INTEGER NOT NULL,
            slot_index INTEGER NOT NULL,
            time TEXT NOT NULL,
            subject TEXT NOT NULL,
            topic TEXT NOT NULL,
            completed INTEGER NOT NULL,
            PRIMARY KEY(teacher_id, week_index, day_index, slot_index),
            FOREIGN KEY(teacher_id, week_index, day_index)
                REFERENCES timetable_days(teacher_id, week_index, day_index) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_slots_teacher ON timetable_slots(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS omr_results(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            username TEXT NOT NULL,
            assignment_id TEXT NOT NULL,
            assignment_topic TEXT NOT NULL,
            success INTEGER NOT NULL,
            answers_json TEXT NOT NULL,
            recorded_at TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_omr_results_assignment ON omr_results(assignment_id)",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        rusqlite::params![key, serde_json::to_string(value)?],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
        let sql = format!("PRAGMA table_info({})", table);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            if name == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[test]
    fn schema_init_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("first init");
        init_schema(&conn).expect("second init");
        assert!(table_has_column(&conn, "timetable_slots", "completed").expect("pragma"));
        assert!(!table_has_column(&conn, "timetable_slots", "status").expect("pragma"));
        assert!(table_has_column(&conn, "omr_results", "answers_json").expect("pragma"));
    }

    #[test]
    fn settings_roundtrip_and_overwrite() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("init");
        assert!(settings_get_json(&conn, "setup.timetable")
            .expect("get")
            .is_none());
        settings_set_json(&conn, "setup.timetable", &json!({ "statusTransitions": "free" }))
            .expect("set");
        settings_set_json(
            &conn,
            "setup.timetable",
            &json!({ "statusTransitions": "forwardOnly" }),
        )
        .expect("overwrite");
        assert_eq!(
            settings_get_json(&conn, "setup.timetable").expect("get"),
            Some(json!({ "statusTransitions": "forwardOnly" }))
        );
    }
}
