use crate::schedule::{RawDay, RawSlot, RawWeek, SavePayload};
use rusqlite::{params, Connection};
use serde::Serialize;

/// Where timetables come from and go back to.
///
/// `save` replaces whatever is stored under `identity`. It either stores the
/// whole payload or nothing. `load` hands back the raw nested shape, with
/// `completed` set and no three-state status.
pub trait TimetableStore {
    fn save(&mut self, identity: &str, payload: &SavePayload) -> anyhow::Result<()>;
    fn load(&self, identity: &str) -> anyhow::Result<Option<Vec<RawWeek>>>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTimetable {
    pub teacher_id: String,
    pub updated_at: String,
}

pub struct SqliteTimetableStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTimetableStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn list(&self) -> anyhow::Result<Vec<StoredTimetable>> {
        let mut stmt = self
            .conn
            .prepare("SELECT teacher_id, updated_at FROM timetables ORDER BY teacher_id")?;
        let rows = stmt.query_map([], |r| {
            Ok(StoredTimetable {
                teacher_id: r.get(0)?,
                updated_at: r.get(1)?,
            })
        })?;
        let out = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(out)
    }
}

impl TimetableStore for SqliteTimetableStore<'_> {
    fn save(&mut self, identity: &str, payload: &SavePayload) -> anyhow::Result<()> {
        // Dropping the transaction on an early return rolls it back.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM timetable_slots WHERE teacher_id = ?",
            [identity],
        )?;
        tx.execute("DELETE FROM timetable_days WHERE teacher_id = ?", [identity])?;
        tx.execute("DELETE FROM timetable_weeks WHERE teacher_id = ?", [identity])?;
        tx.execute(
            "INSERT INTO timetables(teacher_id, updated_at) VALUES(?, ?)
             ON CONFLICT(teacher_id) DO UPDATE SET updated_at = excluded.updated_at",
            params![identity, chrono::Utc::now().to_rfc3339()],
        )?;

        let mut slot_count = 0usize;
        for (wi, week) in payload.weeks.iter().enumerate() {
            tx.execute(
                "INSERT INTO timetable_weeks(teacher_id, week_index, week_number) VALUES(?, ?, ?)",
                params![identity, wi as i64, week.week_number],
            )?;
            for (di, day) in week.days.iter().enumerate() {
                tx.execute(
                    "INSERT INTO timetable_days(teacher_id, week_index, day_index, day)
                     VALUES(?, ?, ?, ?)",
                    params![identity, wi as i64, di as i64, day.day],
                )?;
                for (si, slot) in day.schedule.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO timetable_slots(
                            teacher_id, week_index, day_index, slot_index,
                            time, subject, topic, completed
                         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                        params![
                            identity,
                            wi as i64,
                            di as i64,
                            si as i64,
                            slot.time,
                            slot.subject,
                            slot.topic,
                            if slot.completed { 1 } else { 0 }
                        ],
                    )?;
                    slot_count += 1;
                }
            }
        }
        tx.commit()?;
        tracing::info!(
            teacher_id = identity,
            weeks = payload.weeks.len(),
            slots = slot_count,
            "timetable stored"
        );
        Ok(())
    }

    fn load(&self, identity: &str) -> anyhow::Result<Option<Vec<RawWeek>>> {
        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM timetables WHERE teacher_id = ?",
            [identity],
            |r| r.get(0),
        )?;
        if exists == 0 {
            return Ok(None);
        }

        let mut weeks: Vec<RawWeek> = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT week_number FROM timetable_weeks WHERE teacher_id = ? ORDER BY week_index",
        )?;
        let rows = stmt.query_map([identity], |r| r.get::<_, i64>(0))?;
        for row in rows {
            weeks.push(RawWeek {
                week: None,
                week_number: Some(row?),
                days: Some(Vec::new()),
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT week_index, day FROM timetable_days
             WHERE teacher_id = ?
             ORDER BY week_index, day_index",
        )?;
        let rows = stmt.query_map([identity], |r| {
            Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (wi, day) = row?;
            let Some(days) = weeks.get_mut(wi as usize).and_then(|w| w.days.as_mut()) else {
                anyhow::bail!("timetable_days row references missing week {}", wi);
            };
            days.push(RawDay {
                day: Some(day),
                schedule: Some(Vec::new()),
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT week_index, day_index, time, subject, topic, completed
             FROM timetable_slots
             WHERE teacher_id = ?
             ORDER BY week_index, day_index, slot_index",
        )?;
        let rows = stmt.query_map([identity], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, i64>(1)?,
                RawSlot {
                    time: Some(r.get(2)?),
                    subject: Some(r.get(3)?),
                    topic: Some(r.get(4)?),
                    status: None,
                    completed: Some(r.get::<_, i64>(5)? != 0),
                },
            ))
        })?;
        for row in rows {
            let (wi, di, slot) = row?;
            let Some(schedule) = weeks
                .get_mut(wi as usize)
                .and_then(|w| w.days.as_mut())
                .and_then(|d| d.get_mut(di as usize))
                .and_then(|d| d.schedule.as_mut())
            else {
                anyhow::bail!("timetable_slots row references missing day {}/{}", wi, di);
            };
            schedule.push(slot);
        }

        tracing::debug!(teacher_id = identity, weeks = weeks.len(), "timetable loaded from store");
        Ok(Some(weeks))
    }
}
