use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

const ANSWER_OPTIONS: [&str; 4] = ["A", "B", "C", "D"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmrAnswer {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, thiserror::Error)]
pub enum OmrError {
    #[error("omrResults is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("omrResults must map question numbers to answers")]
    NotAnObject,
}

/// Turns the scanner's `{question: answer}` object, given inline or as a JSON
/// string, into ordered answer rows. Numeric questions sort numerically and
/// come first; other keys follow in key order.
pub fn map_answers(raw: &Value) -> Result<Vec<OmrAnswer>, OmrError> {
    let parsed;
    let object = match raw {
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s)
                .map_err(|e| OmrError::InvalidJson(e.to_string()))?;
            parsed.as_object()
        }
        other => other.as_object(),
    }
    .ok_or(OmrError::NotAnObject)?;

    let mut answers: Vec<OmrAnswer> = object
        .iter()
        .map(|(question, value)| OmrAnswer {
            question: question.clone(),
            answer: answer_text(value),
        })
        .collect();
    answers.sort_by_key(|a| match a.question.parse::<u64>() {
        Ok(n) => (false, n),
        Err(_) => (true, 0),
    });
    Ok(answers)
}

/// Bubble letters normalize to upper case; anything else is kept as scanned.
fn answer_text(value: &Value) -> String {
    match value {
        Value::String(s) => ANSWER_OPTIONS
            .iter()
            .find(|o| o.eq_ignore_ascii_case(s.trim()))
            .map(|o| o.to_string())
            .unwrap_or_else(|| s.clone()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewOmrResult {
    pub user_id: String,
    pub username: String,
    pub assignment_id: String,
    pub assignment_topic: String,
    pub success: bool,
    pub answers: Vec<OmrAnswer>,
    /// Scan time reported by the caller, stored as given.
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OmrResult {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub assignment_id: String,
    pub assignment_topic: String,
    pub success: bool,
    pub answers: Vec<OmrAnswer>,
    pub timestamp: Option<String>,
    pub created_at: String,
}

const SELECT_RESULT: &str = "SELECT id, user_id, username, assignment_id, assignment_topic,
        success, answers_json, recorded_at, created_at
    FROM omr_results";

fn read_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<(OmrResult, String)> {
    Ok((
        OmrResult {
            id: r.get(0)?,
            user_id: r.get(1)?,
            username: r.get(2)?,
            assignment_id: r.get(3)?,
            assignment_topic: r.get(4)?,
            success: r.get::<_, i64>(5)? != 0,
            answers: Vec::new(),
            timestamp: r.get(7)?,
            created_at: r.get(8)?,
        },
        r.get(6)?,
    ))
}

fn with_answers((mut result, answers_json): (OmrResult, String)) -> anyhow::Result<OmrResult> {
    result.answers = serde_json::from_str(&answers_json)?;
    Ok(result)
}

pub fn insert_result(conn: &Connection, new: NewOmrResult) -> anyhow::Result<OmrResult> {
    let result = OmrResult {
        id: Uuid::new_v4().to_string(),
        user_id: new.user_id,
        username: new.username,
        assignment_id: new.assignment_id,
        assignment_topic: new.assignment_topic,
        success: new.success,
        answers: new.answers,
        timestamp: new.timestamp,
        created_at: Utc::now().to_rfc3339(),
    };
    conn.execute(
        "INSERT INTO omr_results(
            id, user_id, username, assignment_id, assignment_topic,
            success, answers_json, recorded_at, created_at
        ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            result.id,
            result.user_id,
            result.username,
            result.assignment_id,
            result.assignment_topic,
            result.success as i64,
            serde_json::to_string(&result.answers)?,
            result.timestamp,
            result.created_at,
        ],
    )?;
    tracing::info!(
        id = %result.id,
        assignment_id = %result.assignment_id,
        answers = result.answers.len(),
        "stored omr result"
    );
    Ok(result)
}

/// Oldest first, optionally restricted to one assignment.
pub fn list_results(conn: &Connection, assignment_id: Option<&str>) -> anyhow::Result<Vec<OmrResult>> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR assignment_id = ?1) ORDER BY created_at, id",
        SELECT_RESULT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([assignment_id], read_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(with_answers(row?)?);
    }
    Ok(out)
}

pub fn get_result(conn: &Connection, id: &str) -> anyhow::Result<Option<OmrResult>> {
    let sql = format!("{} WHERE id = ?", SELECT_RESULT);
    let row = conn.query_row(&sql, [id], read_row).optional()?;
    row.map(with_answers).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    fn questions(answers: &[OmrAnswer]) -> Vec<&str> {
        answers.iter().map(|a| a.question.as_str()).collect()
    }

    #[test]
    fn string_payload_is_parsed_and_ordered_numerically() {
        let answers = map_answers(&json!(r#"{"10":"D","2":"b","1":"A"}"#)).expect("map");
        assert_eq!(questions(&answers), vec!["1", "2", "10"]);
        assert_eq!(answers[1].answer, "B");
        assert_eq!(answers[2].answer, "D");
    }

    #[test]
    fn unrecognised_marks_are_kept_as_scanned() {
        let answers =
            map_answers(&json!({ "1": "AB", "2": null, "3": 4, "notes": "smudged" })).expect("map");
        assert_eq!(questions(&answers), vec!["1", "2", "3", "notes"]);
        assert_eq!(answers[0].answer, "AB");
        assert_eq!(answers[1].answer, "");
        assert_eq!(answers[2].answer, "4");
        assert_eq!(answers[3].answer, "smudged");
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(
            map_answers(&json!("{not json")),
            Err(OmrError::InvalidJson(_))
        ));
        assert!(matches!(
            map_answers(&json!("[\"A\"]")),
            Err(OmrError::NotAnObject)
        ));
        assert!(matches!(map_answers(&json!(7)), Err(OmrError::NotAnObject)));
    }

    #[test]
    fn insert_then_get_and_list_by_assignment() {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");

        let first = insert_result(
            &conn,
            NewOmrResult {
                user_id: "u1".into(),
                username: "Asha".into(),
                assignment_id: "quiz-1".into(),
                assignment_topic: "Fractions".into(),
                success: true,
                answers: map_answers(&json!({ "1": "A", "2": "C" })).expect("map"),
                timestamp: Some("2026-03-02T09:15:00Z".into()),
            },
        )
        .expect("insert first");
        let _ = insert_result(
            &conn,
            NewOmrResult {
                assignment_id: "quiz-2".into(),
                ..NewOmrResult::default()
            },
        )
        .expect("insert second");

        let fetched = get_result(&conn, &first.id).expect("get").expect("present");
        assert_eq!(fetched, first);
        assert_eq!(fetched.answers.len(), 2);
        assert!(get_result(&conn, "missing").expect("get").is_none());

        assert_eq!(list_results(&conn, None).expect("list").len(), 2);
        let quiz_one = list_results(&conn, Some("quiz-1")).expect("list");
        assert_eq!(quiz_one.len(), 1);
        assert_eq!(quiz_one[0].id, first.id);
    }
}
