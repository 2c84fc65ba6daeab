use std::collections::BTreeSet;
use std::sync::Arc;

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde_json::Value;

use crate::workflows::substitution::config::SchedulingPolicy;
use crate::workflows::substitution::domain::{
    AbsenceSlot, Actor, ActorRole, Candidate, RequestId, RequestStatus, SubstitutionRequest,
    TeacherId, TimeSlot,
};
use crate::workflows::substitution::repository::{
    InMemoryNotifier, InMemoryRequestStore, NotifierGateway, NotifyError, RequestRepository,
    SubstitutionNotice,
};
use crate::workflows::substitution::roster::{InMemoryRoster, ScheduleEntry, Teacher};
use crate::workflows::substitution::{substitution_router, SubstitutionService};

pub(super) const REQUESTER: TeacherId = TeacherId(1);
pub(super) const BUSY_TEACHER: TeacherId = TeacherId(3);
pub(super) const LIGHT_CANDIDATE: TeacherId = TeacherId(5);
pub(super) const OTHER_DEPARTMENT: TeacherId = TeacherId(7);
pub(super) const HEAVY_CANDIDATE: TeacherId = TeacherId(8);
pub(super) const DEPARTMENT_HEAD: TeacherId = TeacherId(9);

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(super) fn time(h: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, min, 0).expect("valid time")
}

pub(super) fn slot(start: (u32, u32), end: (u32, u32)) -> TimeSlot {
    TimeSlot {
        start: time(start.0, start.1),
        end: time(end.0, end.1),
    }
}

/// Monday of the fixture week.
pub(super) fn absence_date() -> NaiveDate {
    date(2024, 2, 12)
}

/// One week before the absence, during school hours.
pub(super) fn creation_instant() -> NaiveDateTime {
    date(2024, 2, 5).and_time(time(8, 0))
}

pub(super) fn vlsi_absence() -> AbsenceSlot {
    AbsenceSlot {
        date: absence_date(),
        slot: slot((10, 0), (11, 0)),
        subject: "VLSI Design".to_string(),
    }
}

pub(super) fn head_actor() -> Actor {
    Actor {
        id: DEPARTMENT_HEAD,
        role: ActorRole::HeadOfDepartment,
        department: "ECE".to_string(),
    }
}

pub(super) fn teacher_actor(id: TeacherId) -> Actor {
    Actor {
        id,
        role: ActorRole::Teacher,
        department: "ECE".to_string(),
    }
}

fn subjects(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn teacher(id: TeacherId, name: &str, department: &str, taught: &[&str]) -> Teacher {
    Teacher {
        id,
        full_name: name.to_string(),
        department: department.to_string(),
        subjects: subjects(taught),
    }
}

/// ECE department for the fixture week: the requester teaches VLSI Monday
/// 10:00-11:00, two colleagues are free to cover it, one colleague has a
/// clashing class, and one VLSI teacher sits in another department.
pub(super) fn fixture_roster() -> InMemoryRoster {
    let roster = InMemoryRoster::default();

    roster.add_teacher(teacher(
        REQUESTER,
        "Asha Pillai",
        "ECE",
        &["VLSI Design", "Digital Electronics"],
    ));
    roster.add_schedule_entry(
        REQUESTER,
        ScheduleEntry {
            weekday: Weekday::Mon,
            slot: slot((10, 0), (11, 0)),
            subject: "VLSI Design".to_string(),
            room: "E-204".to_string(),
        },
    );

    roster.add_teacher(teacher(
        BUSY_TEACHER,
        "Kiran Das",
        "ECE",
        &["VLSI Design"],
    ));
    roster.add_schedule_entry(
        BUSY_TEACHER,
        ScheduleEntry {
            weekday: Weekday::Mon,
            slot: slot((10, 0), (11, 0)),
            subject: "Digital Electronics".to_string(),
            room: "E-105".to_string(),
        },
    );

    roster.add_teacher(teacher(
        LIGHT_CANDIDATE,
        "Ravi Menon",
        "ECE",
        &["VLSI Design", "Signals and Systems"],
    ));
    roster.add_teacher(teacher(
        HEAVY_CANDIDATE,
        "Divya Nair",
        "ECE",
        &["VLSI Design", "Embedded Systems"],
    ));

    roster.add_teacher(teacher(
        OTHER_DEPARTMENT,
        "Suresh Iyer",
        "ME",
        &["VLSI Design"],
    ));

    roster.add_teacher(teacher(
        DEPARTMENT_HEAD,
        "Meera Varma",
        "ECE",
        &["Digital Electronics"],
    ));
    roster.assign_head("ECE", DEPARTMENT_HEAD);

    roster
}

pub(super) struct Fixture {
    pub(super) service: SubstitutionService<InMemoryRoster, InMemoryRequestStore, InMemoryNotifier>,
    pub(super) roster: Arc<InMemoryRoster>,
    pub(super) requests: Arc<InMemoryRequestStore>,
    pub(super) notifier: Arc<InMemoryNotifier>,
}

pub(super) fn build_fixture() -> Fixture {
    let roster = Arc::new(fixture_roster());
    let requests = Arc::new(InMemoryRequestStore::default());
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = SubstitutionService::new(
        roster.clone(),
        requests.clone(),
        notifier.clone(),
        SchedulingPolicy::default(),
    );
    Fixture {
        service,
        roster,
        requests,
        notifier,
    }
}

/// Insert a filled request won by `winner`, bumping their workload and, when
/// the date matches an absence under test, blocking that slot.
pub(super) fn seed_win(
    requests: &InMemoryRequestStore,
    tag: &str,
    winner: TeacherId,
    on: NaiveDate,
    at: TimeSlot,
) {
    let created = on.and_time(time(7, 0)) - chrono::Duration::days(7);
    let record = SubstitutionRequest {
        id: RequestId(format!("seed-{tag}")),
        requester: TeacherId(900),
        department: "ECE".to_string(),
        absence: AbsenceSlot {
            date: on,
            slot: at,
            subject: "VLSI Design".to_string(),
        },
        reason: "seeded".to_string(),
        message: None,
        candidates: vec![Candidate {
            teacher_id: winner,
            status: crate::workflows::substitution::domain::CandidateStatus::Accepted,
            responded_at: Some(created),
        }],
        status: RequestStatus::Filled,
        winner: Some(winner),
        created_at: created,
        resolved_at: Some(created),
    };
    requests.insert(record).expect("seed insert succeeds");
}

/// Insert an open request owned by `requester` on `on`, marking them absent.
pub(super) fn seed_own_request(requests: &InMemoryRequestStore, tag: &str, owner: TeacherId, on: NaiveDate) {
    let created = on.and_time(time(7, 0)) - chrono::Duration::days(3);
    let record = SubstitutionRequest {
        id: RequestId(format!("own-{tag}")),
        requester: owner,
        department: "ECE".to_string(),
        absence: AbsenceSlot {
            date: on,
            slot: slot((14, 0), (15, 0)),
            subject: "VLSI Design".to_string(),
        },
        reason: "seeded".to_string(),
        message: None,
        candidates: vec![Candidate::queued(TeacherId(901))],
        status: RequestStatus::PendingHod,
        winner: None,
        created_at: created,
        resolved_at: None,
    };
    requests.insert(record).expect("seed insert succeeds");
}

#[derive(Default)]
pub(super) struct FailingNotifier;

impl NotifierGateway for FailingNotifier {
    fn notify(&self, _notice: SubstitutionNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("push gateway offline".to_string()))
    }
}

pub(super) fn router_with_fixture() -> (axum::Router, Fixture) {
    let fixture = build_fixture();
    let service = Arc::new(SubstitutionService::new(
        fixture.roster.clone(),
        fixture.requests.clone(),
        fixture.notifier.clone(),
        SchedulingPolicy::default(),
    ));
    (substitution_router(service), fixture)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
