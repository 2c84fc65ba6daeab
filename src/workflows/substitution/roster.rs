use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use super::domain::{TeacherId, TimeSlot};

/// Teacher facts the workflow needs: identity, department, capabilities.
/// Profile maintenance happens elsewhere; this view is read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Teacher {
    pub id: TeacherId,
    pub full_name: String,
    pub department: String,
    pub subjects: BTreeSet<String>,
}

impl Teacher {
    pub fn teaches(&self, subject: &str) -> bool {
        self.subjects.contains(subject)
    }
}

/// One recurring weekly timetable slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub weekday: Weekday,
    pub slot: TimeSlot,
    pub subject: String,
    pub room: String,
}

/// Read-only view of teachers and their static weekly timetables. Supplies
/// eligibility and workload facts; the workflow never writes through it.
pub trait RosterStore: Send + Sync {
    fn get_teacher(&self, id: TeacherId) -> Result<Option<Teacher>, RosterError>;

    /// Static entries falling on `date`'s weekday.
    fn schedule_on(&self, teacher: TeacherId, date: NaiveDate)
        -> Result<Vec<ScheduleEntry>, RosterError>;

    fn teachers_with_subject(&self, subject: &str) -> Result<Vec<Teacher>, RosterError>;

    fn department_head(&self, department: &str) -> Result<Option<TeacherId>, RosterError>;
}

/// Error enumeration for roster lookups.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("roster unavailable: {0}")]
    Unavailable(String),
}

/// Mutex-backed roster for the binary, demos, and tests.
#[derive(Default, Clone)]
pub struct InMemoryRoster {
    inner: Arc<Mutex<RosterData>>,
}

#[derive(Default)]
struct RosterData {
    teachers: HashMap<TeacherId, Teacher>,
    schedules: HashMap<TeacherId, Vec<ScheduleEntry>>,
    heads: HashMap<String, TeacherId>,
}

impl InMemoryRoster {
    pub fn add_teacher(&self, teacher: Teacher) {
        let mut data = self.inner.lock().expect("roster mutex poisoned");
        data.teachers.insert(teacher.id, teacher);
    }

    pub fn add_schedule_entry(&self, teacher: TeacherId, entry: ScheduleEntry) {
        let mut data = self.inner.lock().expect("roster mutex poisoned");
        data.schedules.entry(teacher).or_default().push(entry);
    }

    pub fn assign_head(&self, department: impl Into<String>, teacher: TeacherId) {
        let mut data = self.inner.lock().expect("roster mutex poisoned");
        data.heads.insert(department.into(), teacher);
    }
}

impl RosterStore for InMemoryRoster {
    fn get_teacher(&self, id: TeacherId) -> Result<Option<Teacher>, RosterError> {
        let data = self.inner.lock().expect("roster mutex poisoned");
        Ok(data.teachers.get(&id).cloned())
    }

    fn schedule_on(
        &self,
        teacher: TeacherId,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleEntry>, RosterError> {
        let data = self.inner.lock().expect("roster mutex poisoned");
        let weekday = date.weekday();
        Ok(data
            .schedules
            .get(&teacher)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.weekday == weekday)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn teachers_with_subject(&self, subject: &str) -> Result<Vec<Teacher>, RosterError> {
        let data = self.inner.lock().expect("roster mutex poisoned");
        let mut teachers: Vec<Teacher> = data
            .teachers
            .values()
            .filter(|teacher| teacher.teaches(subject))
            .cloned()
            .collect();
        teachers.sort_by_key(|teacher| teacher.id);
        Ok(teachers)
    }

    fn department_head(&self, department: &str) -> Result<Option<TeacherId>, RosterError> {
        let data = self.inner.lock().expect("roster mutex poisoned");
        Ok(data.heads.get(department).copied())
    }
}
