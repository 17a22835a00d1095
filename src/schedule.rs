use serde::{Deserialize, Serialize};
use std::fmt;

/// Lecture status as tracked by the teacher. Ordering follows the usual
/// progression and is what the forward-only transition policy compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub enum SlotStatus {
    #[default]
    Pending,
    Conducted,
    Completed,
}

impl SlotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotStatus::Pending => "Pending",
            SlotStatus::Conducted => "Conducted",
            SlotStatus::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(SlotStatus::Pending),
            "conducted" => Some(SlotStatus::Conducted),
            "completed" => Some(SlotStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub time: String,
    pub subject: String,
    pub topic: String,
    status: SlotStatus,
    completed: bool,
}

impl Slot {
    pub fn new(time: impl Into<String>, subject: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            subject: subject.into(),
            topic: topic.into(),
            status: SlotStatus::Pending,
            completed: false,
        }
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    /// The only write path for status; keeps `completed` in step.
    pub fn set_status(&mut self, status: SlotStatus) {
        self.status = status;
        self.completed = status == SlotStatus::Completed;
    }

    fn with_status(mut self, status: SlotStatus) -> Self {
        self.set_status(status);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Day {
    pub day: String,
    pub schedule: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Week {
    pub week_number: i64,
    pub days: Vec<Day>,
}

/// Weeks → days → slots. Holds only owned data, so a clone never shares
/// structure with its source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schedule {
    weeks: Vec<Week>,
}

// Raw input, as produced by the generator service or reassembled by the store.

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWeek {
    #[serde(default)]
    pub week: Option<i64>,
    #[serde(default)]
    pub week_number: Option<i64>,
    #[serde(default)]
    pub days: Option<Vec<RawDay>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDay {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub schedule: Option<Vec<RawSlot>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSlot {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

fn normalize_status(raw: &RawSlot) -> SlotStatus {
    match raw.status.as_deref() {
        Some(s) if !s.trim().is_empty() => SlotStatus::parse(s).unwrap_or_else(|| {
            tracing::warn!(status = s, "unrecognised slot status, treating as Pending");
            SlotStatus::Pending
        }),
        _ if raw.completed == Some(true) => SlotStatus::Completed,
        _ => SlotStatus::Pending,
    }
}

impl Schedule {
    pub fn from_raw(raw: Vec<RawWeek>) -> Self {
        let weeks = raw
            .into_iter()
            .enumerate()
            .map(|(idx, w)| Week {
                week_number: w.week_number.or(w.week).unwrap_or(idx as i64 + 1),
                days: w
                    .days
                    .unwrap_or_default()
                    .into_iter()
                    .map(|d| Day {
                        day: d.day.unwrap_or_default(),
                        schedule: d
                            .schedule
                            .unwrap_or_default()
                            .into_iter()
                            .map(|s| {
                                let status = normalize_status(&s);
                                Slot::new(
                                    s.time.unwrap_or_default(),
                                    s.subject.unwrap_or_default(),
                                    s.topic.unwrap_or_default(),
                                )
                                .with_status(status)
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self { weeks }
    }

    pub fn weeks(&self) -> &[Week] {
        &self.weeks
    }

    /// Deep copy used for baselines.
    pub fn snapshot(&self) -> Schedule {
        Schedule {
            weeks: self
                .weeks
                .iter()
                .map(|w| Week {
                    week_number: w.week_number,
                    days: w
                        .days
                        .iter()
                        .map(|d| Day {
                            day: d.day.clone(),
                            schedule: d.schedule.to_vec(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[allow(dead_code)]
    pub fn slot(&self, week: usize, day: usize, slot: usize) -> Option<&Slot> {
        self.weeks.get(week)?.days.get(day)?.schedule.get(slot)
    }

    pub fn slot_mut(&mut self, week: usize, day: usize, slot: usize) -> Option<&mut Slot> {
        self.weeks
            .get_mut(week)?
            .days
            .get_mut(day)?
            .schedule
            .get_mut(slot)
    }

    pub fn pending_view(&self) -> Vec<PendingWeek> {
        let mut out = Vec::new();
        for (week_index, w) in self.weeks.iter().enumerate() {
            let mut days = Vec::new();
            for (day_index, d) in w.days.iter().enumerate() {
                let schedule: Vec<PendingSlot> = d
                    .schedule
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| !s.completed())
                    .map(|(slot_index, s)| PendingSlot {
                        slot_index,
                        time: s.time.clone(),
                        subject: s.subject.clone(),
                        topic: s.topic.clone(),
                        status: s.status(),
                    })
                    .collect();
                if !schedule.is_empty() {
                    days.push(PendingDay {
                        day_index,
                        day: d.day.clone(),
                        schedule,
                    });
                }
            }
            if !days.is_empty() {
                out.push(PendingWeek {
                    week_index,
                    week_number: w.week_number,
                    days,
                });
            }
        }
        out
    }

    pub fn stats(&self) -> ScheduleStats {
        let mut stats = ScheduleStats::default();
        for w in &self.weeks {
            let mut week_stats = WeekStats {
                week_number: w.week_number,
                total_slots: 0,
                completed_slots: 0,
            };
            for s in w.days.iter().flat_map(|d| d.schedule.iter()) {
                week_stats.total_slots += 1;
                match s.status() {
                    SlotStatus::Completed => week_stats.completed_slots += 1,
                    SlotStatus::Conducted => stats.conducted_slots += 1,
                    SlotStatus::Pending => {}
                }
            }
            stats.total_slots += week_stats.total_slots;
            stats.completed_slots += week_stats.completed_slots;
            stats.weeks.push(week_stats);
        }
        stats.pending_slots = stats.total_slots - stats.completed_slots;
        stats
    }

    /// Flattens into the persistence shape. Status collapses to `completed`.
    pub fn to_payload(&self) -> SavePayload {
        SavePayload {
            weeks: self
                .weeks
                .iter()
                .map(|w| PayloadWeek {
                    week_number: w.week_number,
                    days: w
                        .days
                        .iter()
                        .map(|d| PayloadDay {
                            day: d.day.clone(),
                            schedule: d
                                .schedule
                                .iter()
                                .map(|s| PayloadSlot {
                                    time: s.time.clone(),
                                    subject: s.subject.clone(),
                                    topic: s.topic.clone(),
                                    completed: s.completed(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSlot {
    pub slot_index: usize,
    pub time: String,
    pub subject: String,
    pub topic: String,
    pub status: SlotStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDay {
    pub day_index: usize,
    pub day: String,
    pub schedule: Vec<PendingSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingWeek {
    pub week_index: usize,
    pub week_number: i64,
    pub days: Vec<PendingDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekStats {
    pub week_number: i64,
    pub total_slots: usize,
    pub completed_slots: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStats {
    pub total_slots: usize,
    pub completed_slots: usize,
    /// Conducted but not yet completed; also counted in `pending_slots`.
    pub conducted_slots: usize,
    pub pending_slots: usize,
    pub weeks: Vec<WeekStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadSlot {
    pub time: String,
    pub subject: String,
    pub topic: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadDay {
    pub day: String,
    pub schedule: Vec<PayloadSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadWeek {
    pub week_number: i64,
    pub days: Vec<PayloadDay>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    pub weeks: Vec<PayloadWeek>,
}
