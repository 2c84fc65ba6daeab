use super::common::*;

use crate::workflows::substitution::domain::AbsenceSlot;

#[test]
fn ranks_eligible_teachers_by_ascending_load() {
    let fixture = build_fixture();
    seed_win(
        &fixture.requests,
        "w1",
        LIGHT_CANDIDATE,
        date(2024, 1, 15),
        slot((9, 0), (10, 0)),
    );
    seed_win(
        &fixture.requests,
        "w2",
        HEAVY_CANDIDATE,
        date(2024, 1, 15),
        slot((11, 0), (12, 0)),
    );
    seed_win(
        &fixture.requests,
        "w3",
        HEAVY_CANDIDATE,
        date(2024, 1, 22),
        slot((9, 0), (10, 0)),
    );

    let ranked = fixture
        .service
        .recommend(REQUESTER, &vlsi_absence())
        .expect("recommendation succeeds");

    let ids: Vec<_> = ranked.iter().map(|entry| entry.teacher.id).collect();
    assert_eq!(ids, vec![LIGHT_CANDIDATE, HEAVY_CANDIDATE]);
    assert_eq!(ranked[0].load, 1);
    assert_eq!(ranked[1].load, 2);
}

#[test]
fn equal_load_breaks_ties_by_teacher_id() {
    let fixture = build_fixture();

    let ranked = fixture
        .service
        .recommend(REQUESTER, &vlsi_absence())
        .expect("recommendation succeeds");

    let ids: Vec<_> = ranked.iter().map(|entry| entry.teacher.id).collect();
    assert_eq!(ids, vec![LIGHT_CANDIDATE, HEAVY_CANDIDATE]);
    assert!(ranked.iter().all(|entry| entry.load == 0));
}

#[test]
fn excludes_requester_busy_colleagues_and_other_departments() {
    let fixture = build_fixture();

    let ranked = fixture
        .service
        .recommend(REQUESTER, &vlsi_absence())
        .expect("recommendation succeeds");

    let ids: Vec<_> = ranked.iter().map(|entry| entry.teacher.id).collect();
    assert!(!ids.contains(&REQUESTER));
    assert!(!ids.contains(&BUSY_TEACHER));
    assert!(!ids.contains(&OTHER_DEPARTMENT));
}

#[test]
fn excludes_teachers_already_committed_in_an_overlapping_slot() {
    let fixture = build_fixture();
    seed_win(
        &fixture.requests,
        "clash",
        LIGHT_CANDIDATE,
        absence_date(),
        slot((10, 30), (11, 30)),
    );

    let ranked = fixture
        .service
        .recommend(REQUESTER, &vlsi_absence())
        .expect("recommendation succeeds");

    let ids: Vec<_> = ranked.iter().map(|entry| entry.teacher.id).collect();
    assert_eq!(ids, vec![HEAVY_CANDIDATE]);
}

#[test]
fn a_commitment_elsewhere_in_the_day_still_counts_toward_load() {
    let fixture = build_fixture();
    seed_win(
        &fixture.requests,
        "afternoon",
        LIGHT_CANDIDATE,
        absence_date(),
        slot((14, 0), (15, 0)),
    );

    let ranked = fixture
        .service
        .recommend(REQUESTER, &vlsi_absence())
        .expect("recommendation succeeds");

    let light = ranked
        .iter()
        .find(|entry| entry.teacher.id == LIGHT_CANDIDATE)
        .expect("non-overlapping commitment keeps the teacher eligible");
    assert_eq!(light.load, 1);
}

#[test]
fn excludes_teachers_with_their_own_request_that_day() {
    let fixture = build_fixture();
    seed_own_request(&fixture.requests, "absent", HEAVY_CANDIDATE, absence_date());

    let ranked = fixture
        .service
        .recommend(REQUESTER, &vlsi_absence())
        .expect("recommendation succeeds");

    let ids: Vec<_> = ranked.iter().map(|entry| entry.teacher.id).collect();
    assert_eq!(ids, vec![LIGHT_CANDIDATE]);
}

#[test]
fn unknown_subject_yields_an_empty_ranking() {
    let fixture = build_fixture();
    let absence = AbsenceSlot {
        subject: "Quantum Computing".to_string(),
        ..vlsi_absence()
    };

    let ranked = fixture
        .service
        .recommend(REQUESTER, &absence)
        .expect("recommendation succeeds");

    assert!(ranked.is_empty());
}
