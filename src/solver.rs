use crate::catalog::{CatalogScope, ResourceCatalog};
use crate::config::SearchConfig;
use crate::conflicts::{detect_conflicts, Conflict};
use crate::constraints::ConstraintModel;
use crate::data::{CatalogInput, GenerationRequest, GenerationResponse, ScheduleEntry};
use crate::error::GenerationError;
use crate::scoring::{rank, score, suggestions};
use crate::search::{AssignmentSearch, SearchParams};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// Generates up to `request.num_options` ranked timetables.
///
/// Pure computation over `input`: nothing is persisted and nothing is
/// shared with other requests. `cancel` is polled between placements.
pub fn generate(
    input: &CatalogInput,
    request: &GenerationRequest,
    search: &SearchConfig,
    cancel: &AtomicBool,
) -> Result<GenerationResponse, GenerationError> {
    let start_time = Instant::now();
    let scope = CatalogScope {
        department_id: request.department_id.clone(),
        semester: Some(request.semester),
    };
    let catalog = ResourceCatalog::build(input, &scope)?;
    catalog.ensure_complete()?;
    let model = ConstraintModel::from_specs(&input.constraints);

    info!(
        "Generating {} option(s) for department {}, {} semester {}: {} required sessions, soft constraints {:?}.",
        request.num_options,
        request.department_id.as_deref().unwrap_or("(all)"),
        request.academic_year,
        request.semester,
        catalog.total_required_sessions(),
        model.soft_names()
    );

    let params = SearchParams {
        options: request.num_options.max(1),
        max_iterations: search.max_iterations,
        time_limit: search.time_limit(),
        restart_factor: search.restart_factor,
        seed: search.seed,
    };
    let wanted = params.options;
    let output = AssignmentSearch::new(&catalog, &model, params, cancel).run();

    if output.complete.is_empty() {
        let best_partial = rank(
            output
                .partial
                .iter()
                .map(|found| score(&catalog, &model, found))
                .collect(),
            wanted,
        );
        warn!(
            "No complete timetable found in {:.2?}; returning {} partial option(s).",
            start_time.elapsed(),
            best_partial.len()
        );
        return Err(GenerationError::InfeasibleRequest { best_partial });
    }

    let scored = output
        .complete
        .iter()
        .chain(&output.partial)
        .map(|found| score(&catalog, &model, found))
        .collect();
    let options = rank(scored, wanted);

    info!(
        "Generated {} option(s) in {:.2?}; best fitness {:.3}.",
        options.len(),
        start_time.elapsed(),
        options.first().map(|o| o.fitness_score).unwrap_or(0.0)
    );
    Ok(GenerationResponse {
        options,
        stats: output.stats,
    })
}

/// Conflicts found in a stored or hand-edited schedule.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub conflicts: Vec<Conflict>,
    pub suggestions: Vec<String>,
}

/// Checks `entries` against the hard rules. Findings are data, never errors;
/// only a malformed catalog fails.
pub fn audit(input: &CatalogInput, entries: &[ScheduleEntry]) -> Result<AuditReport, GenerationError> {
    let catalog = ResourceCatalog::build(input, &CatalogScope::default())?;
    let conflicts = detect_conflicts(&catalog, entries);
    info!("Audited {} entries: {} conflict(s).", entries.len(), conflicts.len());
    let suggestions = suggestions(&conflicts, &[], &[]);
    Ok(AuditReport {
        conflicts,
        suggestions,
    })
}
