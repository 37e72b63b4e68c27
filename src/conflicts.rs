//! Hard-rule conflict detection.
//!
//! [`detect_conflicts`] audits a finished entry set, however it was built.
//! [`Occupancy`] is the incremental form of the same overlap and workload
//! rules, updated placement by placement while the search runs.

use crate::catalog::{BatchIdx, ClassroomIdx, FacultyIdx, Placement, ResourceCatalog, SlotIdx};
use crate::data::ScheduleEntry;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    FacultyOverlap,
    ClassroomOverlap,
    BatchOverlap,
    CapacityExceeded,
    WorkloadExceeded,
    UnqualifiedFaculty,
    UnknownReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

impl ConflictKind {
    pub fn severity(self) -> Severity {
        match self {
            ConflictKind::FacultyOverlap
            | ConflictKind::ClassroomOverlap
            | ConflictKind::BatchOverlap => Severity::Critical,
            ConflictKind::CapacityExceeded | ConflictKind::UnqualifiedFaculty => Severity::High,
            ConflictKind::WorkloadExceeded | ConflictKind::UnknownReference => Severity::Medium,
        }
    }
}

/// A violated hard rule together with the entries responsible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub severity: Severity,
    pub description: String,
    /// What an editor could change to clear the conflict.
    pub suggestion: String,
    pub entries: Vec<ScheduleEntry>,
    /// Sessions or seats beyond the limit, for capacity and workload conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excess: Option<u32>,
}

impl Conflict {
    fn new(
        kind: ConflictKind,
        description: String,
        suggestion: String,
        entries: Vec<ScheduleEntry>,
    ) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            description,
            suggestion,
            entries,
            excess: None,
        }
    }

    fn with_excess(mut self, excess: u32) -> Self {
        self.excess = Some(excess);
        self
    }
}

/// Audits `entries` against every hard rule. Pure: the same input always
/// yields the same conflicts in the same order.
pub fn detect_conflicts(catalog: &ResourceCatalog, entries: &[ScheduleEntry]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    overlaps(entries, ConflictKind::FacultyOverlap, |e| &e.faculty_id, "Faculty", &mut conflicts);
    overlaps(entries, ConflictKind::ClassroomOverlap, |e| &e.classroom_id, "Classroom", &mut conflicts);
    overlaps(entries, ConflictKind::BatchOverlap, |e| &e.batch_id, "Batch", &mut conflicts);

    let mut day_load: BTreeMap<(&str, u8), Vec<&ScheduleEntry>> = BTreeMap::new();
    let mut week_load: BTreeMap<&str, Vec<&ScheduleEntry>> = BTreeMap::new();

    for entry in entries {
        let Some(p) = catalog.placement_for(entry) else {
            conflicts.push(Conflict::new(
                ConflictKind::UnknownReference,
                format!(
                    "Entry at slot {} references a slot, subject, faculty, classroom or batch outside the catalog",
                    entry.time_slot_id
                ),
                format!(
                    "Fix the entry at slot {} so it only references catalog records",
                    entry.time_slot_id
                ),
                vec![entry.clone()],
            ));
            continue;
        };

        let students = catalog.batch(p.batch).student_count;
        let capacity = catalog.classroom(p.classroom).capacity;
        if students > capacity {
            conflicts.push(
                Conflict::new(
                    ConflictKind::CapacityExceeded,
                    format!(
                        "Classroom {} seats {} but batch {} has {} students",
                        entry.classroom_id, capacity, entry.batch_id, students
                    ),
                    format!(
                        "Move batch {} out of classroom {} into a room seating at least {}",
                        entry.batch_id, entry.classroom_id, students
                    ),
                    vec![entry.clone()],
                )
                .with_excess(students - capacity),
            );
        }

        if !catalog.is_qualified(p.faculty, p.subject) {
            conflicts.push(Conflict::new(
                ConflictKind::UnqualifiedFaculty,
                format!(
                    "Faculty {} is not eligible to teach subject {}",
                    entry.faculty_id, entry.subject_id
                ),
                format!(
                    "Assign faculty eligible for subject {} in place of {}",
                    entry.subject_id, entry.faculty_id
                ),
                vec![entry.clone()],
            ));
        }

        let day = catalog.slot(p.slot).day_of_week;
        day_load.entry((entry.faculty_id.as_str(), day)).or_default().push(entry);
        week_load.entry(entry.faculty_id.as_str()).or_default().push(entry);
    }

    for ((faculty_id, day), assigned) in day_load {
        let Some(f) = catalog.faculty_idx(faculty_id) else { continue };
        let limit = catalog.faculty(f).max_classes_per_day;
        let count = assigned.len() as u32;
        if count > limit {
            conflicts.push(
                Conflict::new(
                    ConflictKind::WorkloadExceeded,
                    format!(
                        "Faculty {} teaches {} sessions on day {} (daily limit {})",
                        faculty_id, count, day, limit
                    ),
                    format!(
                        "Faculty {} exceeds daily load on day {} by {} session(s)",
                        faculty_id,
                        day,
                        count - limit
                    ),
                    assigned.into_iter().cloned().collect(),
                )
                .with_excess(count - limit),
            );
        }
    }
    for (faculty_id, assigned) in week_load {
        let Some(f) = catalog.faculty_idx(faculty_id) else { continue };
        let limit = catalog.faculty(f).max_classes_per_week;
        let count = assigned.len() as u32;
        if count > limit {
            conflicts.push(
                Conflict::new(
                    ConflictKind::WorkloadExceeded,
                    format!(
                        "Faculty {} teaches {} sessions this week (weekly limit {})",
                        faculty_id, count, limit
                    ),
                    format!(
                        "Faculty {} exceeds weekly load by {} session(s)",
                        faculty_id,
                        count - limit
                    ),
                    assigned.into_iter().cloned().collect(),
                )
                .with_excess(count - limit),
            );
        }
    }

    conflicts
}

// One conflict per (slot, resource) shared by more than one entry.
fn overlaps<'a>(
    entries: &'a [ScheduleEntry],
    kind: ConflictKind,
    resource: impl Fn(&'a ScheduleEntry) -> &'a String,
    label: &str,
    conflicts: &mut Vec<Conflict>,
) {
    let mut groups: BTreeMap<(&str, &str), Vec<&ScheduleEntry>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry((entry.time_slot_id.as_str(), resource(entry).as_str()))
            .or_default()
            .push(entry);
    }
    for ((slot, id), clashing) in groups {
        if clashing.len() > 1 {
            conflicts.push(Conflict::new(
                kind,
                format!("{} {} is booked {} times in slot {}", label, id, clashing.len(), slot),
                format!(
                    "Move {} of the sessions sharing {} {} in slot {} to a free slot",
                    clashing.len() - 1,
                    label.to_lowercase(),
                    id,
                    slot
                ),
                clashing.into_iter().cloned().collect(),
            ));
        }
    }
}

/// Incremental occupancy of a partial schedule.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    rooms: HashSet<(SlotIdx, ClassroomIdx)>,
    faculty: HashSet<(SlotIdx, FacultyIdx)>,
    batches: HashSet<(SlotIdx, BatchIdx)>,
    faculty_day: HashMap<(FacultyIdx, u8), u32>,
    faculty_week: HashMap<FacultyIdx, u32>,
}

impl Occupancy {
    pub fn faculty_busy(&self, slot: SlotIdx, faculty: FacultyIdx) -> bool {
        self.faculty.contains(&(slot, faculty))
    }

    pub fn room_busy(&self, slot: SlotIdx, classroom: ClassroomIdx) -> bool {
        self.rooms.contains(&(slot, classroom))
    }

    pub fn batch_busy(&self, slot: SlotIdx, batch: BatchIdx) -> bool {
        self.batches.contains(&(slot, batch))
    }

    pub fn day_load(&self, faculty: FacultyIdx, day: u8) -> u32 {
        self.faculty_day.get(&(faculty, day)).copied().unwrap_or(0)
    }

    pub fn week_load(&self, faculty: FacultyIdx) -> u32 {
        self.faculty_week.get(&faculty).copied().unwrap_or(0)
    }

    pub fn insert(&mut self, catalog: &ResourceCatalog, p: &Placement) {
        let day = catalog.slot(p.slot).day_of_week;
        self.rooms.insert((p.slot, p.classroom));
        self.faculty.insert((p.slot, p.faculty));
        self.batches.insert((p.slot, p.batch));
        *self.faculty_day.entry((p.faculty, day)).or_insert(0) += 1;
        *self.faculty_week.entry(p.faculty).or_insert(0) += 1;
    }

    pub fn remove(&mut self, catalog: &ResourceCatalog, p: &Placement) {
        let day = catalog.slot(p.slot).day_of_week;
        self.rooms.remove(&(p.slot, p.classroom));
        self.faculty.remove(&(p.slot, p.faculty));
        self.batches.remove(&(p.slot, p.batch));
        if let Some(n) = self.faculty_day.get_mut(&(p.faculty, day)) {
            *n = n.saturating_sub(1);
        }
        if let Some(n) = self.faculty_week.get_mut(&p.faculty) {
            *n = n.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogScope;
    use crate::data::SessionType;
    use crate::test_support::*;

    fn entry(slot: &str, faculty: &str, room: &str, batch: &str) -> ScheduleEntry {
        ScheduleEntry {
            time_slot_id: slot.into(),
            subject_id: "subj_1".into(),
            faculty_id: faculty.into(),
            classroom_id: room.into(),
            batch_id: batch.into(),
            session_type: SessionType::Lecture,
        }
    }

    fn two_batch_catalog() -> ResourceCatalog {
        let mut input = single_subject_catalog(1, 1);
        input.batches.push(batch("batch_2", "dept_1", 3, 40, &["subj_1"]));
        ResourceCatalog::build(&input, &CatalogScope::default()).unwrap()
    }

    #[test]
    fn forced_merge_reports_one_critical_overlap_per_resource() {
        let catalog = two_batch_catalog();
        let merged = vec![
            entry("slot_1", "fac_1", "room_1", "batch_1"),
            entry("slot_1", "fac_1", "room_1", "batch_2"),
        ];
        let conflicts = detect_conflicts(&catalog, &merged);

        let count = |kind| conflicts.iter().filter(|c| c.kind == kind).count();
        assert_eq!(count(ConflictKind::FacultyOverlap), 1);
        assert_eq!(count(ConflictKind::ClassroomOverlap), 1);
        assert_eq!(count(ConflictKind::BatchOverlap), 0);
        assert!(conflicts.iter().all(|c| c.severity == Severity::Critical));
        assert!(conflicts.iter().all(|c| c.entries.len() == 2));
    }

    #[test]
    fn detection_is_idempotent() {
        let catalog = two_batch_catalog();
        let merged = vec![
            entry("slot_1", "fac_1", "room_1", "batch_1"),
            entry("slot_1", "fac_1", "room_1", "batch_2"),
            entry("slot_1", "fac_1", "room_1", "batch_1"),
        ];
        assert_eq!(detect_conflicts(&catalog, &merged), detect_conflicts(&catalog, &merged));
    }

    #[test]
    fn capacity_and_qualification_are_audited() {
        let mut input = single_subject_catalog(1, 2);
        input.classrooms.push(classroom("small", 20, crate::data::ClassroomType::Seminar));
        input.faculty.push(faculty("fac_2", "dept_1", &[]));
        let catalog = ResourceCatalog::build(&input, &CatalogScope::default()).unwrap();

        let conflicts = detect_conflicts(
            &catalog,
            &[entry("slot_1", "fac_2", "small", "batch_1")],
        );
        let capacity = conflicts
            .iter()
            .find(|c| c.kind == ConflictKind::CapacityExceeded)
            .unwrap();
        assert_eq!(capacity.severity, Severity::High);
        assert_eq!(capacity.excess, Some(25));
        assert!(conflicts.iter().any(|c| c.kind == ConflictKind::UnqualifiedFaculty));
    }

    #[test]
    fn workload_overrun_reports_excess() {
        let mut input = single_subject_catalog(3, 10);
        input.faculty[0].max_classes_per_week = 1;
        let catalog = ResourceCatalog::build(&input, &CatalogScope::default()).unwrap();
        let entries = vec![
            entry("slot_1", "fac_1", "room_1", "batch_1"),
            entry("slot_2", "fac_1", "room_1", "batch_1"),
            entry("slot_3", "fac_1", "room_1", "batch_1"),
        ];
        let conflicts = detect_conflicts(&catalog, &entries);
        let weekly: Vec<&Conflict> = conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::WorkloadExceeded)
            .collect();
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].excess, Some(2));
        assert_eq!(weekly[0].severity, Severity::Medium);
        assert_eq!(weekly[0].suggestion, "Faculty fac_1 exceeds weekly load by 2 session(s)");
    }

    #[test]
    fn unknown_references_are_findings_not_errors() {
        let catalog = two_batch_catalog();
        let conflicts = detect_conflicts(&catalog, &[entry("nowhere", "fac_1", "room_1", "batch_1")]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::UnknownReference);
    }

    #[test]
    fn occupancy_tracks_and_releases_placements() {
        let catalog = two_batch_catalog();
        let mut occupancy = Occupancy::default();
        let first = Placement { batch: 0, subject: 0, slot: 0, classroom: 0, faculty: 0 };
        occupancy.insert(&catalog, &first);

        assert!(occupancy.faculty_busy(0, 0));
        assert!(occupancy.room_busy(0, 0));
        assert!(!occupancy.batch_busy(0, 1));
        assert_eq!(occupancy.day_load(0, 1), 1);
        assert_eq!(occupancy.week_load(0), 1);

        occupancy.remove(&catalog, &first);
        assert!(!occupancy.faculty_busy(0, 0));
        assert_eq!(occupancy.week_load(0), 0);
    }
}
