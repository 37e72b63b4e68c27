//! Most-constrained-first backtracking over session placements.
//!
//! Every required session of a (batch, subject) pair is one placement
//! request; its domain is every (slot, classroom, faculty) triple the
//! catalog allows. Requests are ordered by domain size, smallest first, so
//! the pickiest sessions fail early. Each request takes the first candidate
//! that passes every hard rule against the schedule built so far; a request
//! with nothing left undoes the previous placement and that request moves
//! on to its next candidate.
//!
//! Several runs are made to produce distinct options. Run 0 is fully
//! deterministic (earliest slot, tightest room). Later runs shuffle the
//! order of equally scarce requests and the order of valid candidates with
//! a seeded RNG. Each run is bounded by an iteration budget; the request as
//! a whole by a deadline and an external cancellation flag.

use crate::catalog::{BatchIdx, ClassroomIdx, FacultyIdx, Placement, ResourceCatalog, SlotIdx, SubjectIdx};
use crate::constraints::{ConstraintModel, PartialSchedule};
use crate::data::{SearchStats, UnmetRequirement};
use itertools::Itertools;
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Distinct complete schedules wanted.
    pub options: usize,
    pub max_iterations: u64,
    pub time_limit: Duration,
    pub restart_factor: usize,
    pub seed: u64,
}

/// All sessions of one subject for one batch.
#[derive(Debug, Clone)]
struct SessionGroup {
    batch: BatchIdx,
    subject: SubjectIdx,
    sessions: u32,
    /// Statically allowed triples in (slot, tightest room, faculty) order.
    domain: Vec<(SlotIdx, ClassroomIdx, FacultyIdx)>,
}

#[derive(Debug, Clone, Copy)]
struct Request {
    group: usize,
    /// 1-based.
    session: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Complete,
    /// Every alternative was tried; no complete schedule exists.
    Exhausted,
    OutOfBudget,
    Cancelled,
}

/// A schedule produced by one run.
#[derive(Debug, Clone)]
pub struct FoundSchedule {
    pub placements: Vec<Placement>,
    pub unmet: Vec<UnmetRequirement>,
    /// Run that produced it; earlier runs win ranking ties.
    pub generation: usize,
}

impl FoundSchedule {
    pub fn is_complete(&self) -> bool {
        self.unmet.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutput {
    pub complete: Vec<FoundSchedule>,
    pub partial: Vec<FoundSchedule>,
    pub stats: SearchStats,
}

struct Frame {
    candidates: Vec<Placement>,
    next: usize,
}

pub struct AssignmentSearch<'a> {
    catalog: &'a ResourceCatalog,
    model: &'a ConstraintModel,
    params: SearchParams,
    cancel: &'a AtomicBool,
    groups: Vec<SessionGroup>,
}

impl<'a> AssignmentSearch<'a> {
    pub fn new(
        catalog: &'a ResourceCatalog,
        model: &'a ConstraintModel,
        params: SearchParams,
        cancel: &'a AtomicBool,
    ) -> Self {
        let mut groups = Vec::new();
        for batch in 0..catalog.batch_count() {
            let students = catalog.batch(batch).student_count;
            for req in catalog.required_sessions(batch).iter().filter(|r| r.sessions > 0) {
                let rooms: Vec<ClassroomIdx> = catalog
                    .eligible_classrooms(req.subject, batch)
                    .iter()
                    .copied()
                    .sorted_by_key(|&c| catalog.classroom(c).capacity - students)
                    .collect();
                let faculty = catalog.eligible_faculty(req.subject);
                let domain = catalog
                    .teaching_slots()
                    .iter()
                    .flat_map(|&s| rooms.iter().map(move |&c| (s, c)))
                    .flat_map(|(s, c)| faculty.iter().map(move |&f| (s, c, f)))
                    .collect();
                groups.push(SessionGroup {
                    batch,
                    subject: req.subject,
                    sessions: req.sessions,
                    domain,
                });
            }
        }
        Self {
            catalog,
            model,
            params,
            cancel,
            groups,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn run(&self) -> SearchOutput {
        let start = Instant::now();
        let deadline = start + self.params.time_limit;
        let wanted = self.params.options.max(1);
        let max_runs = if self.groups.is_empty() {
            1
        } else {
            wanted * self.params.restart_factor.max(1)
        };
        info!(
            "Searching for {} option(s): {} session groups, {} sessions, up to {} runs.",
            wanted,
            self.groups.len(),
            self.groups.iter().map(|g| g.sessions).sum::<u32>(),
            max_runs
        );

        let mut output = SearchOutput::default();
        let mut seen: HashSet<Vec<Placement>> = HashSet::new();

        for generation in 0..max_runs {
            if self.cancelled() {
                output.stats.cancelled = true;
                break;
            }
            if Instant::now() >= deadline {
                output.stats.budget_exhausted = true;
                break;
            }

            let (found, end) = self.run_once(generation, deadline, &mut output.stats);
            output.stats.runs += 1;
            match end {
                RunEnd::OutOfBudget => output.stats.budget_exhausted = true,
                RunEnd::Cancelled => output.stats.cancelled = true,
                RunEnd::Complete | RunEnd::Exhausted => {}
            }
            debug!(
                "Run {} ended {:?}: {} placed, {} unmet.",
                generation,
                end,
                found.placements.len(),
                found.unmet.len()
            );

            let key: Vec<Placement> = found.placements.iter().copied().sorted().collect();
            if seen.insert(key) {
                if found.is_complete() {
                    output.complete.push(found);
                } else {
                    output.partial.push(found);
                }
            }

            if output.complete.len() >= wanted || matches!(end, RunEnd::Exhausted | RunEnd::Cancelled) {
                break;
            }
        }

        output.stats.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Search finished in {:.2?}: {} complete, {} partial option(s) over {} run(s).",
            start.elapsed(),
            output.complete.len(),
            output.partial.len(),
            output.stats.runs
        );
        output
    }

    fn request_order(&self, rng: Option<&mut StdRng>) -> Vec<Request> {
        let mut order: Vec<usize> = (0..self.groups.len()).collect();
        if let Some(rng) = rng {
            order.shuffle(rng);
        }
        order.sort_by_key(|&g| self.groups[g].domain.len());
        order
            .into_iter()
            .flat_map(|g| (1..=self.groups[g].sessions).map(move |session| Request { group: g, session }))
            .collect()
    }

    // Valid candidates for `request` against `schedule`, in trial order.
    fn candidates(
        &self,
        schedule: &PartialSchedule,
        request: Request,
        previous_session_ordinal: Option<usize>,
        rng: Option<&mut StdRng>,
    ) -> Vec<Placement> {
        let group = &self.groups[request.group];
        let mut valid: Vec<Placement> = group
            .domain
            .iter()
            .filter(|(slot, _, _)| {
                previous_session_ordinal
                    .is_none_or(|prev| self.catalog.slot_ordinal(*slot).is_some_and(|o| o > prev))
            })
            .map(|&(slot, classroom, faculty)| Placement {
                batch: group.batch,
                subject: group.subject,
                slot,
                classroom,
                faculty,
            })
            .filter(|p| !self.model.violates_hard(self.catalog, schedule, p))
            .collect();
        if let Some(rng) = rng {
            valid.shuffle(rng);
        }
        valid
    }

    fn run_once(
        &self,
        generation: usize,
        deadline: Instant,
        stats: &mut SearchStats,
    ) -> (FoundSchedule, RunEnd) {
        let mut rng = (generation > 0)
            .then(|| StdRng::seed_from_u64(self.params.seed.wrapping_add(generation as u64)));
        let requests = self.request_order(rng.as_mut());

        let mut schedule = PartialSchedule::new();
        let mut frames: Vec<Frame> = Vec::with_capacity(requests.len());
        let mut best: Vec<Placement> = Vec::new();
        let mut iterations = 0u64;

        let end = loop {
            let depth = schedule.len();
            if depth == requests.len() {
                break RunEnd::Complete;
            }
            if self.cancelled() {
                break RunEnd::Cancelled;
            }
            if iterations >= self.params.max_iterations || Instant::now() >= deadline {
                break RunEnd::OutOfBudget;
            }

            if frames.len() == depth {
                let request = requests[depth];
                // Sessions of one group sit next to each other in the order and
                // are interchangeable, so each must come after the previous one.
                let previous = (request.session > 1)
                    .then(|| schedule.placements()[depth - 1].slot)
                    .and_then(|slot| self.catalog.slot_ordinal(slot));
                let candidates = self.candidates(&schedule, request, previous, rng.as_mut());
                frames.push(Frame { candidates, next: 0 });
            }

            let frame = &mut frames[depth];
            if let Some(&placement) = frame.candidates.get(frame.next) {
                frame.next += 1;
                iterations += 1;
                stats.placements += 1;
                schedule.place(self.catalog, placement);
                if schedule.len() > best.len() {
                    best = schedule.placements().to_vec();
                }
            } else {
                frames.pop();
                match schedule.pop(self.catalog) {
                    Some(undone) => {
                        stats.backtracks += 1;
                        trace!(
                            "Backtracking at depth {}: undoing batch {} subject {} at slot {}.",
                            depth,
                            undone.batch,
                            undone.subject,
                            undone.slot
                        );
                    }
                    None => break RunEnd::Exhausted,
                }
            }
        };

        let placements = match end {
            RunEnd::Complete => schedule.placements().to_vec(),
            RunEnd::Cancelled => best,
            RunEnd::Exhausted | RunEnd::OutOfBudget => self.fill_greedily(&best),
        };
        let unmet = self.unmet_requirements(&placements);
        (
            FoundSchedule {
                placements,
                unmet,
                generation,
            },
            end,
        )
    }

    // Extends the deepest partial schedule with whatever still fits, one
    // request at a time and without backtracking.
    fn fill_greedily(&self, best: &[Placement]) -> Vec<Placement> {
        let mut schedule = PartialSchedule::new();
        for &p in best {
            schedule.place(self.catalog, p);
        }
        let mut placed: HashMap<usize, u32> = HashMap::new();
        for p in best {
            if let Some(g) = self.group_of(p) {
                *placed.entry(g).or_insert(0) += 1;
            }
        }
        for (g, group) in self.groups.iter().enumerate() {
            let mut have = placed.get(&g).copied().unwrap_or(0);
            while have < group.sessions {
                let request = Request { group: g, session: have + 1 };
                let Some(&p) = self.candidates(&schedule, request, None, None).first() else {
                    break;
                };
                schedule.place(self.catalog, p);
                have += 1;
            }
        }
        schedule.placements().to_vec()
    }

    fn group_of(&self, p: &Placement) -> Option<usize> {
        self.groups
            .iter()
            .position(|g| g.batch == p.batch && g.subject == p.subject)
    }

    fn unmet_requirements(&self, placements: &[Placement]) -> Vec<UnmetRequirement> {
        let placed = placements.iter().counts_by(|p| (p.batch, p.subject));
        self.groups
            .iter()
            .flat_map(|g| {
                let have = placed.get(&(g.batch, g.subject)).copied().unwrap_or(0) as u32;
                (have + 1..=g.sessions).map(move |session_number| UnmetRequirement {
                    batch_id: self.catalog.batch(g.batch).id.clone(),
                    subject_id: self.catalog.subject(g.subject).id.clone(),
                    session_number,
                    sessions_required: g.sessions,
                })
            })
            .collect()
    }
}
