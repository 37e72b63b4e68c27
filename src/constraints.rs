//! Hard rules and soft preferences.
//!
//! Hard rules are predicates over a partial schedule and one candidate
//! placement; the search never keeps a placement any of them rejects.
//! Soft rules score a finished placement set in `[0, 1]` and explain what
//! they did not get. New rules are new [`HardConstraint`] or
//! [`SoftConstraint`] implementations registered on the model.

use crate::catalog::{Placement, ResourceCatalog};
use crate::conflicts::Occupancy;
use crate::data::{ConstraintKind, ConstraintSpec, UnmetSoftConstraint};
use itertools::Itertools;
use log::{debug, warn};
use std::collections::HashMap;

/// Placements made so far, with their occupancy index kept in step.
#[derive(Debug, Clone, Default)]
pub struct PartialSchedule {
    placements: Vec<Placement>,
    occupancy: Occupancy,
}

impl PartialSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place(&mut self, catalog: &ResourceCatalog, p: Placement) {
        self.occupancy.insert(catalog, &p);
        self.placements.push(p);
    }

    /// Undoes the most recent placement.
    pub fn pop(&mut self, catalog: &ResourceCatalog) -> Option<Placement> {
        let p = self.placements.pop()?;
        self.occupancy.remove(catalog, &p);
        Some(p)
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }
}

pub trait HardConstraint: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether adding `candidate` to `schedule` breaks this rule.
    fn violated_by(
        &self,
        catalog: &ResourceCatalog,
        schedule: &PartialSchedule,
        candidate: &Placement,
    ) -> bool;
}

/// Outcome of one soft rule on one schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftEvaluation {
    pub score: f64,
    pub unmet: Vec<UnmetSoftConstraint>,
}

impl SoftEvaluation {
    fn satisfied() -> Self {
        Self {
            score: 1.0,
            unmet: Vec::new(),
        }
    }
}

pub trait SoftConstraint: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, catalog: &ResourceCatalog, placements: &[Placement]) -> SoftEvaluation;
}

pub struct FacultyDoubleBooking;
pub struct ClassroomDoubleBooking;
pub struct BatchDoubleBooking;
pub struct ClassroomCapacity;
pub struct FacultyWorkload;
pub struct SubjectFacultyMatching;

impl HardConstraint for FacultyDoubleBooking {
    fn name(&self) -> &'static str {
        "No Faculty Double Booking"
    }
    fn violated_by(&self, _: &ResourceCatalog, schedule: &PartialSchedule, p: &Placement) -> bool {
        schedule.occupancy().faculty_busy(p.slot, p.faculty)
    }
}

impl HardConstraint for ClassroomDoubleBooking {
    fn name(&self) -> &'static str {
        "No Classroom Double Booking"
    }
    fn violated_by(&self, _: &ResourceCatalog, schedule: &PartialSchedule, p: &Placement) -> bool {
        schedule.occupancy().room_busy(p.slot, p.classroom)
    }
}

impl HardConstraint for BatchDoubleBooking {
    fn name(&self) -> &'static str {
        "No Batch Double Booking"
    }
    fn violated_by(&self, _: &ResourceCatalog, schedule: &PartialSchedule, p: &Placement) -> bool {
        schedule.occupancy().batch_busy(p.slot, p.batch)
    }
}

impl HardConstraint for ClassroomCapacity {
    fn name(&self) -> &'static str {
        "Classroom Capacity"
    }
    fn violated_by(&self, catalog: &ResourceCatalog, _: &PartialSchedule, p: &Placement) -> bool {
        catalog.batch(p.batch).student_count > catalog.classroom(p.classroom).capacity
    }
}

impl HardConstraint for FacultyWorkload {
    fn name(&self) -> &'static str {
        "Faculty Workload Limit"
    }
    fn violated_by(&self, catalog: &ResourceCatalog, schedule: &PartialSchedule, p: &Placement) -> bool {
        let member = catalog.faculty(p.faculty);
        let day = catalog.slot(p.slot).day_of_week;
        let occupancy = schedule.occupancy();
        occupancy.day_load(p.faculty, day) >= member.max_classes_per_day
            || occupancy.week_load(p.faculty) >= member.max_classes_per_week
    }
}

impl HardConstraint for SubjectFacultyMatching {
    fn name(&self) -> &'static str {
        "Subject-Faculty Matching"
    }
    fn violated_by(&self, catalog: &ResourceCatalog, _: &PartialSchedule, p: &Placement) -> bool {
        !catalog.is_qualified(p.faculty, p.subject)
    }
}

// Placements grouped per (owner, day) and sorted by slot number.
fn daily_runs<K: std::hash::Hash + Eq>(
    catalog: &ResourceCatalog,
    placements: &[Placement],
    owner: impl Fn(&Placement) -> K,
) -> HashMap<(K, u8), Vec<Placement>> {
    let mut runs: HashMap<(K, u8), Vec<Placement>> = placements
        .iter()
        .map(|p| ((owner(p), catalog.slot(p.slot).day_of_week), *p))
        .into_group_map();
    for run in runs.values_mut() {
        run.sort_by_key(|p| catalog.slot(p.slot).slot_number);
    }
    runs
}

/// Spreads each batch's sessions evenly over the teaching days.
pub struct BalancedDailySchedule;

impl SoftConstraint for BalancedDailySchedule {
    fn name(&self) -> &'static str {
        "Balanced Daily Schedule"
    }

    fn evaluate(&self, catalog: &ResourceCatalog, placements: &[Placement]) -> SoftEvaluation {
        let days = catalog.teaching_days();
        if days.is_empty() || placements.is_empty() {
            return SoftEvaluation::satisfied();
        }
        let by_batch = placements.iter().into_group_map_by(|p| p.batch);
        let mut total = 0.0;
        let mut unmet = Vec::new();
        for (&batch, sessions) in by_batch.iter().sorted_by_key(|(b, _)| **b) {
            let counts: Vec<f64> = days
                .iter()
                .map(|&d| {
                    sessions
                        .iter()
                        .filter(|p| catalog.slot(p.slot).day_of_week == d)
                        .count() as f64
                })
                .collect();
            let mean = counts.iter().sum::<f64>() / counts.len() as f64;
            let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / counts.len() as f64;
            total += 1.0 / (1.0 + variance);

            let (min, max) = counts.iter().copied().minmax().into_option().unwrap_or((0.0, 0.0));
            if max - min >= 2.0 {
                unmet.push(UnmetSoftConstraint {
                    constraint_type: self.name().to_string(),
                    description: format!(
                        "Batch {} has between {} and {} sessions per day",
                        catalog.batch(batch).id,
                        min,
                        max
                    ),
                });
            }
        }
        SoftEvaluation {
            score: total / by_batch.len() as f64,
            unmet,
        }
    }
}

/// Rewards a batch having the same subject in back-to-back periods.
pub struct ConsecutiveClasses;

impl SoftConstraint for ConsecutiveClasses {
    fn name(&self) -> &'static str {
        "Consecutive Classes Preference"
    }

    fn evaluate(&self, catalog: &ResourceCatalog, placements: &[Placement]) -> SoftEvaluation {
        let runs = daily_runs(catalog, placements, |p| p.batch);
        let (mut pairs, mut same) = (0usize, 0usize);
        for run in runs.values() {
            for (a, b) in run.iter().tuple_windows() {
                pairs += 1;
                if a.subject == b.subject {
                    same += 1;
                }
            }
        }
        if pairs == 0 {
            return SoftEvaluation::satisfied();
        }
        SoftEvaluation {
            score: same as f64 / pairs as f64,
            unmet: Vec::new(),
        }
    }
}

/// Prefers morning-shift periods. Slots without a shift tag count as
/// morning when they fall in the first half of their day, rounding up.
pub struct PreferMornings;

impl SoftConstraint for PreferMornings {
    fn name(&self) -> &'static str {
        "Prefer Mornings"
    }

    fn evaluate(&self, catalog: &ResourceCatalog, placements: &[Placement]) -> SoftEvaluation {
        if placements.is_empty() {
            return SoftEvaluation::satisfied();
        }
        let last_slot_of_day: HashMap<u8, u32> = catalog
            .teaching_slots()
            .iter()
            .map(|&s| (catalog.slot(s).day_of_week, catalog.slot(s).slot_number))
            .into_grouping_map()
            .max();

        let mut morning = 0usize;
        let mut unmet = Vec::new();
        for p in placements {
            let slot = catalog.slot(p.slot);
            let is_morning = if slot.shift.is_empty() {
                let last = last_slot_of_day.get(&slot.day_of_week).copied().unwrap_or(0);
                slot.slot_number * 2 <= last + 1
            } else {
                slot.shift.eq_ignore_ascii_case("morning")
            };
            if is_morning {
                morning += 1;
            } else {
                unmet.push(UnmetSoftConstraint {
                    constraint_type: self.name().to_string(),
                    description: format!(
                        "Subject {} for batch {} is scheduled at slot {}, which is not in the morning",
                        catalog.subject(p.subject).id,
                        catalog.batch(p.batch).id,
                        slot.id
                    ),
                });
            }
        }
        SoftEvaluation {
            score: morning as f64 / placements.len() as f64,
            unmet,
        }
    }
}

/// Penalises faculty teaching in two adjacent periods.
pub struct AvoidBackToBack;

impl SoftConstraint for AvoidBackToBack {
    fn name(&self) -> &'static str {
        "Avoid Back-to-Back Classes"
    }

    fn evaluate(&self, catalog: &ResourceCatalog, placements: &[Placement]) -> SoftEvaluation {
        let runs = daily_runs(catalog, placements, |p| p.faculty);
        let mut pairs = 0usize;
        let mut unmet = Vec::new();
        for ((faculty, _), run) in runs.iter().sorted_by_key(|((f, d), _)| (*f, *d)) {
            for (a, b) in run.iter().tuple_windows() {
                pairs += 1;
                let (first, second) = (catalog.slot(a.slot), catalog.slot(b.slot));
                if first.slot_number + 1 == second.slot_number {
                    unmet.push(UnmetSoftConstraint {
                        constraint_type: self.name().to_string(),
                        description: format!(
                            "Faculty {} has back-to-back classes in slots {} and {}",
                            catalog.faculty(*faculty).id,
                            first.id,
                            second.id
                        ),
                    });
                }
            }
        }
        if pairs == 0 {
            return SoftEvaluation::satisfied();
        }
        SoftEvaluation {
            score: 1.0 - unmet.len() as f64 / pairs as f64,
            unmet,
        }
    }
}

fn soft_by_name(name: &str) -> Option<Box<dyn SoftConstraint>> {
    let known: [Box<dyn SoftConstraint>; 4] = [
        Box::new(BalancedDailySchedule),
        Box::new(ConsecutiveClasses),
        Box::new(PreferMornings),
        Box::new(AvoidBackToBack),
    ];
    known
        .into_iter()
        .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
}

struct WeightedSoft {
    weight: f64,
    constraint: Box<dyn SoftConstraint>,
}

/// Aggregated soft outcome of one schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftReport {
    pub score: f64,
    pub unmet: Vec<UnmetSoftConstraint>,
}

pub struct ConstraintModel {
    hard: Vec<Box<dyn HardConstraint>>,
    soft: Vec<WeightedSoft>,
}

impl ConstraintModel {
    /// Only the built-in hard rules; no preferences.
    pub fn hard_only() -> Self {
        Self {
            hard: Vec::new(),
            soft: Vec::new(),
        }
        .with_hard(FacultyDoubleBooking)
        .with_hard(ClassroomDoubleBooking)
        .with_hard(BatchDoubleBooking)
        .with_hard(ClassroomCapacity)
        .with_hard(FacultyWorkload)
        .with_hard(SubjectFacultyMatching)
    }

    /// Built-in hard rules plus the default preferences.
    pub fn with_defaults() -> Self {
        Self::hard_only()
            .with_soft(1.0, BalancedDailySchedule)
            .with_soft(1.0, PreferMornings)
            .with_soft(0.5, AvoidBackToBack)
    }

    /// Builds the model from the institution's active constraint records.
    /// Hard records name built-in rules, which are always enforced.
    pub fn from_specs(specs: &[ConstraintSpec]) -> Self {
        let mut model = Self::hard_only();
        for record in specs.iter().filter(|s| s.is_active) {
            match record.kind {
                ConstraintKind::Hard => {
                    if model.hard.iter().any(|h| h.name().eq_ignore_ascii_case(record.name.trim())) {
                        debug!("Hard constraint '{}' is built in.", record.name);
                    } else {
                        warn!("Hard constraint '{}' is not recognised and will not be enforced.", record.name);
                    }
                }
                ConstraintKind::Soft => match soft_by_name(&record.name) {
                    Some(_) if record.weight <= 0.0 => {
                        warn!("Soft constraint '{}' has non-positive weight; ignored.", record.name)
                    }
                    Some(constraint) => model.soft.push(WeightedSoft {
                        weight: record.weight,
                        constraint,
                    }),
                    None => warn!("Soft constraint '{}' is not recognised; ignored.", record.name),
                },
            }
        }
        if model.soft.is_empty() {
            debug!("No usable soft constraints supplied; using defaults.");
            return Self::with_defaults();
        }
        model
    }

    pub fn with_hard(mut self, constraint: impl HardConstraint + 'static) -> Self {
        self.hard.push(Box::new(constraint));
        self
    }

    pub fn with_soft(mut self, weight: f64, constraint: impl SoftConstraint + 'static) -> Self {
        self.soft.push(WeightedSoft {
            weight,
            constraint: Box::new(constraint),
        });
        self
    }

    pub fn violates_hard(
        &self,
        catalog: &ResourceCatalog,
        schedule: &PartialSchedule,
        candidate: &Placement,
    ) -> bool {
        self.first_violation(catalog, schedule, candidate).is_some()
    }

    /// Name of the first hard rule `candidate` breaks.
    pub fn first_violation(
        &self,
        catalog: &ResourceCatalog,
        schedule: &PartialSchedule,
        candidate: &Placement,
    ) -> Option<&'static str> {
        self.hard
            .iter()
            .find(|h| h.violated_by(catalog, schedule, candidate))
            .map(|h| h.name())
    }

    /// Weighted mean of every soft rule's score; 1.0 with no soft rules.
    pub fn soft_score(&self, catalog: &ResourceCatalog, placements: &[Placement]) -> SoftReport {
        let total_weight: f64 = self.soft.iter().map(|s| s.weight).sum();
        if total_weight <= 0.0 {
            return SoftReport {
                score: 1.0,
                unmet: Vec::new(),
            };
        }
        let mut weighted = 0.0;
        let mut unmet = Vec::new();
        for soft in &self.soft {
            let evaluation = soft.constraint.evaluate(catalog, placements);
            weighted += soft.weight * evaluation.score.clamp(0.0, 1.0);
            unmet.extend(evaluation.unmet);
        }
        SoftReport {
            score: weighted / total_weight,
            unmet,
        }
    }

    pub fn soft_names(&self) -> Vec<&'static str> {
        self.soft.iter().map(|s| s.constraint.name()).collect()
    }
}
