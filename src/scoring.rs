//! Fitness scoring and ranking of candidate schedules.
//!
//! Fitness is in `[0, 1]`. Complete schedules land in `[0.5, 1.0]` by soft
//! score; partial ones in `[0, 0.5)` by the fraction of sessions placed, so
//! a schedule missing sessions always ranks below one that is merely
//! less preferable.

use crate::catalog::ResourceCatalog;
use crate::conflicts::{detect_conflicts, Conflict};
use crate::constraints::ConstraintModel;
use crate::data::{CandidateSchedule, ScheduleEntry, UnmetRequirement, UnmetSoftConstraint};
use crate::search::FoundSchedule;
use itertools::Itertools;
use std::cmp::Ordering;

const COMPLETE_FLOOR: f64 = 0.5;
// Share of a partial schedule's fitness still decided by preferences.
const PARTIAL_SOFT_SHARE: f64 = 0.1;

pub fn fitness(completeness: f64, soft_score: f64) -> f64 {
    let completeness = completeness.clamp(0.0, 1.0);
    let soft_score = soft_score.clamp(0.0, 1.0);
    if completeness >= 1.0 {
        COMPLETE_FLOOR + (1.0 - COMPLETE_FLOOR) * soft_score
    } else {
        COMPLETE_FLOOR * completeness * (1.0 - PARTIAL_SOFT_SHARE + PARTIAL_SOFT_SHARE * soft_score)
    }
}

/// A found schedule with everything the ranker needs.
#[derive(Debug, Clone)]
pub struct ScoredSchedule {
    pub generation: usize,
    pub fitness: f64,
    pub entries: Vec<ScheduleEntry>,
    pub conflicts: Vec<Conflict>,
    pub unmet: Vec<UnmetRequirement>,
    pub unmet_soft: Vec<UnmetSoftConstraint>,
}

pub fn score(catalog: &ResourceCatalog, model: &ConstraintModel, found: &FoundSchedule) -> ScoredSchedule {
    let required = catalog.total_required_sessions();
    let completeness = if required == 0 {
        1.0
    } else {
        found.placements.len() as f64 / required as f64
    };
    let soft = model.soft_score(catalog, &found.placements);

    let entries: Vec<ScheduleEntry> = found
        .placements
        .iter()
        .sorted_by_key(|p| (catalog.slot_ordinal(p.slot), p.batch, p.subject))
        .map(|p| catalog.entry_for(p))
        .collect();
    let conflicts = detect_conflicts(catalog, &entries);

    ScoredSchedule {
        generation: found.generation,
        fitness: fitness(completeness, soft.score),
        entries,
        conflicts,
        unmet: found.unmet.clone(),
        unmet_soft: soft.unmet,
    }
}

fn rank_order(a: &ScoredSchedule, b: &ScoredSchedule) -> Ordering {
    b.fitness
        .total_cmp(&a.fitness)
        .then_with(|| a.conflicts.len().cmp(&b.conflicts.len()))
        .then_with(|| a.generation.cmp(&b.generation))
}

/// Best first: fitness descending, then fewer conflicts, then earlier
/// generation. Keeps at most `limit` options and numbers them from 1.
pub fn rank(mut scored: Vec<ScoredSchedule>, limit: usize) -> Vec<CandidateSchedule> {
    scored.sort_by(rank_order);
    scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, s)| CandidateSchedule {
            option_number: i + 1,
            fitness_score: s.fitness,
            conflicts: s.conflicts.len(),
            suggestions: suggestions(&s.conflicts, &s.unmet, &s.unmet_soft),
            entries: s.entries,
            unmet_requirements: s.unmet,
            unmet_soft_constraints: s.unmet_soft,
        })
        .collect()
}

/// Human-readable fixes: conflicts first, then missing sessions, then a
/// one-line summary per preference that was not met.
pub fn suggestions(
    conflicts: &[Conflict],
    unmet: &[UnmetRequirement],
    unmet_soft: &[UnmetSoftConstraint],
) -> Vec<String> {
    let mut out: Vec<String> = conflicts.iter().map(|c| c.suggestion.clone()).collect();

    for ((batch, subject), missing) in &unmet
        .iter()
        .chunk_by(|u| (u.batch_id.as_str(), u.subject_id.as_str()))
    {
        let missing: Vec<&UnmetRequirement> = missing.collect();
        out.push(format!(
            "Batch {} is missing {} of {} weekly session(s) of subject {}; add teaching slots, classrooms or eligible faculty",
            batch,
            missing.len(),
            missing[0].sessions_required,
            subject
        ));
    }

    let soft_counts = unmet_soft.iter().counts_by(|u| u.constraint_type.as_str());
    for (constraint_type, count) in soft_counts.into_iter().sorted() {
        out.push(format!(
            "{}: {} placement(s) could move to better slots",
            constraint_type, count
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogScope;
    use crate::data::SessionType;
    use crate::test_support::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn scored(generation: usize, fitness: f64, conflicts: usize) -> ScoredSchedule {
        let entry = ScheduleEntry {
            time_slot_id: "slot_1".into(),
            subject_id: "subj_1".into(),
            faculty_id: "fac_1".into(),
            classroom_id: "room_1".into(),
            batch_id: "batch_1".into(),
            session_type: SessionType::Lecture,
        };
        let conflict = Conflict {
            kind: crate::conflicts::ConflictKind::BatchOverlap,
            severity: crate::conflicts::Severity::Critical,
            description: String::new(),
            suggestion: "move it".into(),
            entries: vec![entry.clone()],
            excess: None,
        };
        ScoredSchedule {
            generation,
            fitness,
            entries: vec![entry],
            conflicts: vec![conflict; conflicts],
            unmet: Vec::new(),
            unmet_soft: Vec::new(),
        }
    }

    #[test]
    fn partial_never_outranks_complete() {
        assert!(fitness(0.99, 1.0) < fitness(1.0, 0.0));
        assert_eq!(fitness(1.0, 1.0), 1.0);
        assert_eq!(fitness(0.0, 1.0), 0.0);
        assert!(fitness(0.5, 1.0) > fitness(0.5, 0.0));
    }

    #[test]
    fn ranking_breaks_ties_by_conflicts_then_generation() {
        let ranked = rank(
            vec![scored(2, 0.7, 0), scored(0, 0.7, 1), scored(1, 0.9, 0), scored(3, 0.7, 0)],
            10,
        );
        let order: Vec<(f64, usize)> = ranked.iter().map(|c| (c.fitness_score, c.conflicts)).collect();
        assert_eq!(order, vec![(0.9, 0), (0.7, 0), (0.7, 0), (0.7, 1)]);
        assert_eq!(
            ranked.iter().map(|c| c.option_number).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn ranking_is_stable_under_input_order() {
        let make = || {
            vec![
                scored(0, 0.6, 0),
                scored(1, 0.6, 0),
                scored(2, 0.8, 2),
                scored(3, 0.8, 1),
                scored(4, 0.3, 0),
            ]
        };
        let baseline: Vec<usize> = {
            let mut s = make();
            s.sort_by(rank_order);
            s.iter().map(|s| s.generation).collect()
        };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let mut shuffled = make();
            shuffled.shuffle(&mut rng);
            shuffled.sort_by(rank_order);
            let order: Vec<usize> = shuffled.iter().map(|s| s.generation).collect();
            assert_eq!(order, baseline);
        }
        assert_eq!(baseline, vec![3, 2, 0, 1, 4]);
    }

    #[test]
    fn rank_truncates_to_limit() {
        let ranked = rank(vec![scored(0, 0.5, 0), scored(1, 0.6, 0)], 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].fitness_score, 0.6);
    }

    #[test]
    fn suggestions_cover_missing_sessions() {
        let unmet = vec![
            UnmetRequirement {
                batch_id: "b".into(),
                subject_id: "s".into(),
                session_number: 2,
                sessions_required: 3,
            },
            UnmetRequirement {
                batch_id: "b".into(),
                subject_id: "s".into(),
                session_number: 3,
                sessions_required: 3,
            },
        ];
        let soft = vec![
            UnmetSoftConstraint {
                constraint_type: "Prefer Mornings".into(),
                description: String::new(),
            };
            2
        ];
        let out = suggestions(&[], &unmet, &soft);
        assert_eq!(out.len(), 2);
        assert!(out[0].starts_with("Batch b is missing 2 of 3 weekly session(s) of subject s"));
        assert_eq!(out[1], "Prefer Mornings: 2 placement(s) could move to better slots");
    }

    #[test]
    fn complete_schedule_scores_in_upper_half() {
        let catalog =
            ResourceCatalog::build(&single_subject_catalog(2, 5), &CatalogScope::default()).unwrap();
        let found = FoundSchedule {
            placements: vec![
                crate::catalog::Placement { batch: 0, subject: 0, slot: 0, classroom: 0, faculty: 0 },
                crate::catalog::Placement { batch: 0, subject: 0, slot: 1, classroom: 0, faculty: 0 },
            ],
            unmet: Vec::new(),
            generation: 0,
        };
        let s = score(&catalog, &ConstraintModel::with_defaults(), &found);
        assert!(s.fitness >= 0.5 && s.fitness <= 1.0);
        assert!(s.conflicts.is_empty());
        assert_eq!(s.entries.len(), 2);
        assert_eq!(s.entries[0].time_slot_id, "slot_1");
    }
}
