//! Normalised, indexed view of one request's reference data.
//!
//! Records are stored in vectors and addressed by position everywhere in
//! the search; string ids only appear at the boundary. A catalog is a
//! snapshot: it is built once per request and never mutated afterwards.

use crate::data::{
    Batch, CatalogInput, Classroom, ClassroomType, DepartmentId, Faculty, ScheduleEntry,
    SessionType, Subject, TimeSlot,
};
use crate::error::{CatalogIssue, GenerationError, MissingResource, UnservableRequirement};
use itertools::Itertools;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

pub type SlotIdx = usize;
pub type ClassroomIdx = usize;
pub type SubjectIdx = usize;
pub type FacultyIdx = usize;
pub type BatchIdx = usize;

/// Which part of the institution a catalog covers.
#[derive(Debug, Clone, Default)]
pub struct CatalogScope {
    pub department_id: Option<DepartmentId>,
    pub semester: Option<u32>,
}

/// Sessions of one subject a batch needs every week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRequirement {
    pub subject: SubjectIdx,
    pub sessions: u32,
}

/// A schedule entry in index form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Placement {
    pub batch: BatchIdx,
    pub subject: SubjectIdx,
    pub slot: SlotIdx,
    pub classroom: ClassroomIdx,
    pub faculty: FacultyIdx,
}

#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    slots: Vec<TimeSlot>,
    classrooms: Vec<Classroom>,
    subjects: Vec<Subject>,
    faculty: Vec<Faculty>,
    batches: Vec<Batch>,

    slot_by_id: HashMap<String, SlotIdx>,
    classroom_by_id: HashMap<String, ClassroomIdx>,
    subject_by_id: HashMap<String, SubjectIdx>,
    faculty_by_id: HashMap<String, FacultyIdx>,
    batch_by_id: HashMap<String, BatchIdx>,

    /// Non-break slots in (day, slot number) order.
    teaching_slots: Vec<SlotIdx>,
    /// Position of each slot within `teaching_slots`.
    slot_ordinal: Vec<Option<usize>>,
    teaching_days: Vec<u8>,
    faculty_for_subject: Vec<Vec<FacultyIdx>>,
    qualified: HashSet<(FacultyIdx, SubjectIdx)>,
    classrooms_for: HashMap<(BatchIdx, SubjectIdx), Vec<ClassroomIdx>>,
    requirements: Vec<Vec<SessionRequirement>>,
    unknown_requirements: Vec<(BatchIdx, String)>,
}

/// Collects structural problems without stopping at the first one.
pub fn validate_input(input: &CatalogInput) -> Result<(), Vec<CatalogIssue>> {
    let mut issues = Vec::new();

    fn duplicates<'a>(
        entity: &'static str,
        ids: impl Iterator<Item = &'a str>,
        issues: &mut Vec<CatalogIssue>,
    ) {
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                issues.push(CatalogIssue {
                    entity,
                    id: id.to_string(),
                    message: "duplicate id".to_string(),
                });
            }
        }
    }

    duplicates("time slot", input.time_slots.iter().map(|s| s.id.as_str()), &mut issues);
    duplicates("classroom", input.classrooms.iter().map(|c| c.id.as_str()), &mut issues);
    duplicates("subject", input.subjects.iter().map(|s| s.id.as_str()), &mut issues);
    duplicates("faculty", input.faculty.iter().map(|f| f.id.as_str()), &mut issues);
    duplicates("batch", input.batches.iter().map(|b| b.id.as_str()), &mut issues);

    for slot in &input.time_slots {
        if !(1..=7).contains(&slot.day_of_week) {
            issues.push(CatalogIssue {
                entity: "time slot",
                id: slot.id.clone(),
                message: format!("day_of_week {} is outside 1..=7", slot.day_of_week),
            });
        }
    }
    for room in &input.classrooms {
        if room.capacity == 0 {
            issues.push(CatalogIssue {
                entity: "classroom",
                id: room.id.clone(),
                message: "capacity must be positive".to_string(),
            });
        }
    }

    if issues.is_empty() { Ok(()) } else { Err(issues) }
}

fn index_by_id<T>(items: &[T], id: impl Fn(&T) -> &str) -> HashMap<String, usize> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| (id(item).to_string(), i))
        .collect()
}

impl ResourceCatalog {
    /// Validates and indexes `input`, keeping faculty and batches inside
    /// `scope`. Classrooms, subjects and slots are shared institution-wide.
    pub fn build(input: &CatalogInput, scope: &CatalogScope) -> Result<Self, GenerationError> {
        validate_input(input).map_err(GenerationError::InvalidCatalog)?;

        let in_department = |dept: &str| {
            scope
                .department_id
                .as_deref()
                .is_none_or(|wanted| wanted == dept)
        };

        let slots = input.time_slots.clone();
        let classrooms = input.classrooms.clone();
        let subjects = input.subjects.clone();
        let faculty: Vec<Faculty> = input
            .faculty
            .iter()
            .filter(|f| in_department(f.department_id.as_str()))
            .cloned()
            .collect();
        let batches: Vec<Batch> = input
            .batches
            .iter()
            .filter(|b| in_department(b.department_id.as_str()))
            .filter(|b| scope.semester.is_none_or(|s| s == b.semester))
            .cloned()
            .collect();

        let slot_by_id = index_by_id(&slots, |s| s.id.as_str());
        let classroom_by_id = index_by_id(&classrooms, |c| c.id.as_str());
        let subject_by_id = index_by_id(&subjects, |s| s.id.as_str());
        let faculty_by_id = index_by_id(&faculty, |f| f.id.as_str());
        let batch_by_id = index_by_id(&batches, |b| b.id.as_str());

        let teaching_slots: Vec<SlotIdx> = (0..slots.len())
            .filter(|&i| !slots[i].is_break)
            .sorted_by_key(|&i| (slots[i].day_of_week, slots[i].slot_number))
            .collect();
        let mut slot_ordinal = vec![None; slots.len()];
        for (ordinal, &slot) in teaching_slots.iter().enumerate() {
            slot_ordinal[slot] = Some(ordinal);
        }
        let teaching_days: Vec<u8> = teaching_slots
            .iter()
            .map(|&s| slots[s].day_of_week)
            .dedup()
            .collect();

        let mut faculty_for_subject = vec![Vec::new(); subjects.len()];
        let mut qualified = HashSet::new();
        for (f, member) in faculty.iter().enumerate() {
            for subject_id in member.subjects.iter().unique() {
                match subject_by_id.get(subject_id) {
                    Some(&s) => {
                        qualified.insert((f, s));
                        if member.is_available && member.can_teach() {
                            faculty_for_subject[s].push(f);
                        }
                    }
                    None => warn!(
                        "Faculty {} lists unknown subject {}; link ignored.",
                        member.id, subject_id
                    ),
                }
            }
        }

        let mut requirements = Vec::with_capacity(batches.len());
        let mut unknown_requirements = Vec::new();
        let mut classrooms_for = HashMap::new();
        for (b, batch) in batches.iter().enumerate() {
            let mut required = Vec::new();
            for subject_id in batch.subjects.iter().unique() {
                let Some(&s) = subject_by_id.get(subject_id) else {
                    unknown_requirements.push((b, subject_id.clone()));
                    continue;
                };
                required.push(SessionRequirement {
                    subject: s,
                    sessions: subjects[s].classes_per_week,
                });
                classrooms_for.insert(
                    (b, s),
                    suitable_classrooms(&classrooms, batch, &subjects[s]),
                );
            }
            requirements.push(required);
        }

        debug!(
            "Catalog indexed: {} teaching slots over {} days, {} classrooms, {} subjects, {} faculty, {} batches.",
            teaching_slots.len(),
            teaching_days.len(),
            classrooms.len(),
            subjects.len(),
            faculty.len(),
            batches.len()
        );

        Ok(Self {
            slots,
            classrooms,
            subjects,
            faculty,
            batches,
            slot_by_id,
            classroom_by_id,
            subject_by_id,
            faculty_by_id,
            batch_by_id,
            teaching_slots,
            slot_ordinal,
            teaching_days,
            faculty_for_subject,
            qualified,
            classrooms_for,
            requirements,
            unknown_requirements,
        })
    }

    /// Fails with every (batch, subject) pair that no resource can serve.
    /// Must pass before any search starts.
    pub fn ensure_complete(&self) -> Result<(), GenerationError> {
        let mut unservable: Vec<UnservableRequirement> = self
            .unknown_requirements
            .iter()
            .map(|(b, subject_id)| UnservableRequirement {
                batch_id: self.batches[*b].id.clone(),
                subject_id: subject_id.clone(),
                reason: MissingResource::UnknownSubject,
            })
            .collect();

        for (b, required) in self.requirements.iter().enumerate() {
            for req in required.iter().filter(|r| r.sessions > 0) {
                let reason = if self.eligible_faculty(req.subject).is_empty() {
                    MissingResource::NoEligibleFaculty
                } else if self.eligible_classrooms(req.subject, b).is_empty() {
                    MissingResource::NoEligibleClassroom
                } else {
                    continue;
                };
                unservable.push(UnservableRequirement {
                    batch_id: self.batches[b].id.clone(),
                    subject_id: self.subjects[req.subject].id.clone(),
                    reason,
                });
            }
        }

        if unservable.is_empty() {
            Ok(())
        } else {
            Err(GenerationError::IncompleteCatalog(unservable))
        }
    }

    /// Available faculty qualified to teach `subject`.
    pub fn eligible_faculty(&self, subject: SubjectIdx) -> &[FacultyIdx] {
        &self.faculty_for_subject[subject]
    }

    /// Available classrooms that seat `batch` and suit `subject`.
    pub fn eligible_classrooms(&self, subject: SubjectIdx, batch: BatchIdx) -> &[ClassroomIdx] {
        self.classrooms_for
            .get(&(batch, subject))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn required_sessions(&self, batch: BatchIdx) -> &[SessionRequirement] {
        &self.requirements[batch]
    }

    pub fn total_required_sessions(&self) -> u32 {
        self.requirements.iter().flatten().map(|r| r.sessions).sum()
    }

    pub fn is_qualified(&self, faculty: FacultyIdx, subject: SubjectIdx) -> bool {
        self.qualified.contains(&(faculty, subject))
    }

    pub fn session_type(&self, subject: SubjectIdx) -> SessionType {
        if self.subjects[subject].requires_lab {
            SessionType::Lab
        } else {
            SessionType::Lecture
        }
    }

    pub fn teaching_slots(&self) -> &[SlotIdx] {
        &self.teaching_slots
    }

    pub fn slot_ordinal(&self, slot: SlotIdx) -> Option<usize> {
        self.slot_ordinal[slot]
    }

    pub fn teaching_days(&self) -> &[u8] {
        &self.teaching_days
    }

    pub fn slot(&self, idx: SlotIdx) -> &TimeSlot {
        &self.slots[idx]
    }
    pub fn classroom(&self, idx: ClassroomIdx) -> &Classroom {
        &self.classrooms[idx]
    }
    pub fn subject(&self, idx: SubjectIdx) -> &Subject {
        &self.subjects[idx]
    }
    pub fn faculty(&self, idx: FacultyIdx) -> &Faculty {
        &self.faculty[idx]
    }
    pub fn batch(&self, idx: BatchIdx) -> &Batch {
        &self.batches[idx]
    }

    pub fn entry_for(&self, p: &Placement) -> ScheduleEntry {
        ScheduleEntry {
            time_slot_id: self.slots[p.slot].id.clone(),
            subject_id: self.subjects[p.subject].id.clone(),
            faculty_id: self.faculty[p.faculty].id.clone(),
            classroom_id: self.classrooms[p.classroom].id.clone(),
            batch_id: self.batches[p.batch].id.clone(),
            session_type: self.session_type(p.subject),
        }
    }

    /// `None` when the entry references something outside this catalog.
    pub fn placement_for(&self, entry: &ScheduleEntry) -> Option<Placement> {
        Some(Placement {
            batch: self.batch_idx(&entry.batch_id)?,
            subject: self.subject_idx(&entry.subject_id)?,
            slot: self.slot_idx(&entry.time_slot_id)?,
            classroom: self.classroom_idx(&entry.classroom_id)?,
            faculty: self.faculty_idx(&entry.faculty_id)?,
        })
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn slot_idx(&self, id: &str) -> Option<SlotIdx> {
        self.slot_by_id.get(id).copied()
    }
    pub fn classroom_idx(&self, id: &str) -> Option<ClassroomIdx> {
        self.classroom_by_id.get(id).copied()
    }
    pub fn subject_idx(&self, id: &str) -> Option<SubjectIdx> {
        self.subject_by_id.get(id).copied()
    }
    pub fn faculty_idx(&self, id: &str) -> Option<FacultyIdx> {
        self.faculty_by_id.get(id).copied()
    }
    pub fn batch_idx(&self, id: &str) -> Option<BatchIdx> {
        self.batch_by_id.get(id).copied()
    }
}

// Lab subjects go to labs; when the institution has no lab that seats the
// batch, any adequate room is used instead.
fn suitable_classrooms(classrooms: &[Classroom], batch: &Batch, subject: &Subject) -> Vec<ClassroomIdx> {
    let adequate: Vec<ClassroomIdx> = (0..classrooms.len())
        .filter(|&c| classrooms[c].is_available && classrooms[c].capacity >= batch.student_count)
        .collect();
    if !subject.requires_lab {
        return adequate;
    }
    let labs: Vec<ClassroomIdx> = adequate
        .iter()
        .copied()
        .filter(|&c| classrooms[c].room_type == ClassroomType::Lab)
        .collect();
    if labs.is_empty() && !adequate.is_empty() {
        warn!(
            "No lab seats batch {} for lab subject {}; falling back to regular rooms.",
            batch.id, subject.id
        );
        adequate
    } else {
        labs
    }
}
