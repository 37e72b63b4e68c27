use serde::{Deserialize, Serialize};
use std::fmt;

// Type aliases for clarity
pub type TimeSlotId = String;
pub type ClassroomId = String;
pub type SubjectId = String;
pub type FacultyId = String;
pub type BatchId = String;
pub type DepartmentId = String;

fn default_true() -> bool {
    true
}

/// A teaching period in the weekly grid. Reference data, never mutated.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeSlot {
    pub id: TimeSlotId,
    /// 1 = Monday.
    pub day_of_week: u8,
    pub slot_number: u32,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub is_break: bool,
    #[serde(default)]
    pub shift: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassroomType {
    LectureHall,
    #[serde(alias = "laboratory")]
    Lab,
    Seminar,
    Auditorium,
}

/// Represents a physical room with a given capacity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Classroom {
    pub id: ClassroomId,
    #[serde(default)]
    pub name: String,
    pub capacity: u32,
    #[serde(rename = "type")]
    pub room_type: ClassroomType,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Subject {
    pub id: SubjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub credits: u32,
    /// Sessions a batch taking this subject needs every week.
    pub classes_per_week: u32,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub requires_lab: bool,
    #[serde(default)]
    pub subject_type: String,
    pub department_id: DepartmentId,
}

/// An instructor with workload limits and the subjects they may teach.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Faculty {
    pub id: FacultyId,
    #[serde(default)]
    pub profile_id: Option<String>,
    pub department_id: DepartmentId,
    pub max_classes_per_day: u32,
    pub max_classes_per_week: u32,
    #[serde(default)]
    pub specializations: Vec<String>,
    /// Eligible subject ids.
    #[serde(default)]
    pub subjects: Vec<SubjectId>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

impl Faculty {
    /// Zero daily or weekly maxima leave no room for any session.
    pub fn can_teach(&self) -> bool {
        self.max_classes_per_day > 0 && self.max_classes_per_week > 0
    }
}

/// A cohort of students sharing one weekly timetable.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Batch {
    pub id: BatchId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub year: u32,
    pub semester: u32,
    pub student_count: u32,
    pub department_id: DepartmentId,
    /// Required subject ids.
    #[serde(default)]
    pub subjects: Vec<SubjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Hard,
    Soft,
}

/// A scheduling rule as stored by the institution.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConstraintSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ConstraintKind,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Everything the engine reads from the institution's store, as plain records.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogInput {
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub classrooms: Vec<Classroom>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub faculty: Vec<Faculty>,
    #[serde(default)]
    pub batches: Vec<Batch>,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
}

fn default_num_options() -> usize {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    #[serde(default)]
    pub academic_year: String,
    pub semester: u32,
    #[serde(default = "default_num_options")]
    pub num_options: usize,
    /// Stored by the caller, ignored by the engine.
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Lecture,
    Lab,
    Tutorial,
}

/// One scheduled session: the atomic unit of a timetable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct ScheduleEntry {
    pub time_slot_id: TimeSlotId,
    pub subject_id: SubjectId,
    pub faculty_id: FacultyId,
    pub classroom_id: ClassroomId,
    pub batch_id: BatchId,
    #[serde(rename = "class_type", default = "default_session_type")]
    pub session_type: SessionType,
}

fn default_session_type() -> SessionType {
    SessionType::Lecture
}

/// A required session the search could not place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmetRequirement {
    pub batch_id: BatchId,
    pub subject_id: SubjectId,
    /// 1-based index of the missing weekly session.
    pub session_number: u32,
    pub sessions_required: u32,
}

impl fmt::Display for UnmetRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {} is missing session {} of {} for subject {}",
            self.batch_id, self.session_number, self.sessions_required, self.subject_id
        )
    }
}

/// Describes a soft constraint that was not met in the final schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

/// One ranked timetable option.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSchedule {
    pub option_number: usize,
    pub fitness_score: f64,
    pub conflicts: usize,
    pub suggestions: Vec<String>,
    pub entries: Vec<ScheduleEntry>,
    pub unmet_requirements: Vec<UnmetRequirement>,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    pub runs: usize,
    pub placements: u64,
    pub backtracks: u64,
    pub elapsed_ms: u64,
    pub budget_exhausted: bool,
    pub cancelled: bool,
}

/// The final output of the engine.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResponse {
    pub options: Vec<CandidateSchedule>,
    pub stats: SearchStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classroom_accepts_laboratory_alias() {
        let room: Classroom = serde_json::from_value(json!({
            "id": "room_1",
            "name": "Lab 3",
            "capacity": 30,
            "type": "laboratory",
        }))
        .unwrap();
        assert_eq!(room.room_type, ClassroomType::Lab);
        assert!(room.is_available);
        assert!(room.department_id.is_none());
    }

    #[test]
    fn entry_uses_class_type_on_the_wire() {
        let entry = ScheduleEntry {
            time_slot_id: "slot_1".into(),
            subject_id: "subj_1".into(),
            faculty_id: "fac_1".into(),
            classroom_id: "room_1".into(),
            batch_id: "batch_1".into(),
            session_type: SessionType::Lab,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["class_type"], "lab");
        assert_eq!(value["batch_id"], "batch_1");
    }

    #[test]
    fn request_defaults_to_three_options() {
        let request: GenerationRequest = serde_json::from_value(json!({
            "department_id": "dept_1",
            "academic_year": "2025-26",
            "semester": 3,
        }))
        .unwrap();
        assert_eq!(request.num_options, 3);
        assert!(request.notes.is_none());
    }

    #[test]
    fn unmet_requirement_reads_naturally() {
        let unmet = UnmetRequirement {
            batch_id: "cs-a".into(),
            subject_id: "cs201".into(),
            session_number: 2,
            sessions_required: 3,
        };
        assert_eq!(
            unmet.to_string(),
            "batch cs-a is missing session 2 of 3 for subject cs201"
        );
    }
}
