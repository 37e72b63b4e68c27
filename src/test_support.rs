//! Catalog fixtures shared by the unit tests.

use crate::data::{
    Batch, CatalogInput, Classroom, ClassroomType, ConstraintKind, ConstraintSpec, Faculty,
    Subject, TimeSlot,
};

pub fn slot(id: &str, day_of_week: u8, slot_number: u32) -> TimeSlot {
    TimeSlot {
        id: id.into(),
        day_of_week,
        slot_number,
        start_time: format!("{:02}:00", 8 + slot_number),
        end_time: format!("{:02}:00", 9 + slot_number),
        is_break: false,
        shift: String::new(),
    }
}

pub fn classroom(id: &str, capacity: u32, room_type: ClassroomType) -> Classroom {
    Classroom {
        id: id.into(),
        name: id.to_uppercase(),
        capacity,
        room_type,
        equipment: vec!["projector".into()],
        is_available: true,
        department_id: None,
    }
}

pub fn subject(id: &str, department_id: &str, classes_per_week: u32) -> Subject {
    Subject {
        id: id.into(),
        name: id.into(),
        code: id.to_uppercase(),
        credits: 4,
        classes_per_week,
        duration_minutes: 60,
        requires_lab: false,
        subject_type: "core".into(),
        department_id: department_id.into(),
    }
}

pub fn faculty(id: &str, department_id: &str, subjects: &[&str]) -> Faculty {
    Faculty {
        id: id.into(),
        profile_id: None,
        department_id: department_id.into(),
        max_classes_per_day: 4,
        max_classes_per_week: 20,
        specializations: Vec::new(),
        subjects: subjects.iter().map(|s| s.to_string()).collect(),
        is_available: true,
    }
}

pub fn batch(id: &str, department_id: &str, semester: u32, student_count: u32, subjects: &[&str]) -> Batch {
    Batch {
        id: id.into(),
        name: id.into(),
        year: 2,
        semester,
        student_count,
        department_id: department_id.into(),
        subjects: subjects.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn rule(name: &str, kind: ConstraintKind, weight: f64) -> ConstraintSpec {
    ConstraintSpec {
        name: name.into(),
        kind,
        weight,
        description: String::new(),
        is_active: true,
    }
}

/// One batch of 45 needing `sessions` weekly sessions of `subj_1`, one
/// faculty, one 60-seat room. Slot `i` (id `slot_{i+1}`) sits on day
/// `1 + i % 5`, period `1 + i / 5`.
pub fn single_subject_catalog(sessions: u32, slots: usize) -> CatalogInput {
    CatalogInput {
        time_slots: (0..slots)
            .map(|i| slot(&format!("slot_{}", i + 1), 1 + (i % 5) as u8, 1 + (i / 5) as u32))
            .collect(),
        classrooms: vec![classroom("room_1", 60, ClassroomType::LectureHall)],
        subjects: vec![subject("subj_1", "dept_1", sessions)],
        faculty: vec![faculty("fac_1", "dept_1", &["subj_1"])],
        batches: vec![batch("batch_1", "dept_1", 3, 45, &["subj_1"])],
        constraints: Vec::new(),
    }
}

/// A small department: five days of five periods with a break in the
/// middle, two batches, four subjects (one lab), three faculty.
pub fn department_catalog() -> CatalogInput {
    let mut time_slots = Vec::new();
    for day in 1..=5u8 {
        for period in 1..=5u32 {
            let mut s = slot(&format!("d{}p{}", day, period), day, period);
            s.is_break = period == 3;
            s.shift = if period < 3 { "morning" } else { "afternoon" }.into();
            time_slots.push(s);
        }
    }

    let mut lab_subject = subject("cs_lab", "dept_1", 2);
    lab_subject.requires_lab = true;

    let mut fac_3 = faculty("fac_3", "dept_1", &["cs_lab"]);
    fac_3.max_classes_per_day = 2;
    fac_3.max_classes_per_week = 8;

    CatalogInput {
        time_slots,
        classrooms: vec![
            classroom("hall_a", 80, ClassroomType::LectureHall),
            classroom("hall_b", 50, ClassroomType::LectureHall),
            classroom("seminar", 40, ClassroomType::Seminar),
            classroom("lab_1", 50, ClassroomType::Lab),
        ],
        subjects: vec![
            subject("cs201", "dept_1", 3),
            subject("cs202", "dept_1", 2),
            subject("ma201", "dept_1", 2),
            lab_subject,
            subject("ee101", "dept_2", 3),
        ],
        faculty: vec![
            faculty("fac_1", "dept_1", &["cs201", "cs202"]),
            faculty("fac_2", "dept_1", &["cs201", "ma201"]),
            fac_3,
            faculty("fac_9", "dept_2", &["ee101"]),
        ],
        batches: vec![
            batch("cs_a", "dept_1", 3, 45, &["cs201", "cs202", "cs_lab"]),
            batch("cs_b", "dept_1", 3, 35, &["cs201", "ma201"]),
            batch("cs_c", "dept_1", 5, 30, &["cs202"]),
            batch("ee_a", "dept_2", 3, 60, &["ee101"]),
        ],
        constraints: vec![
            rule("No Faculty Double Booking", ConstraintKind::Hard, 10.0),
            rule("Balanced Daily Schedule", ConstraintKind::Soft, 2.0),
            rule("Prefer Mornings", ConstraintKind::Soft, 1.0),
            rule("Avoid Back-to-Back Classes", ConstraintKind::Soft, 1.0),
        ],
    }
}
