//! Global listener dispatch
//!
//! Decides which Targets receive a finished build without the job asking for
//! them. A Target is eligible when it is a global listener, its filter
//! matches the job path (a blank filter matches everything) and the job did
//! not already publish to it explicitly.

use crate::context::BuildContext;
use crate::store::TargetStore;
use crate::target::Target;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether `filter` matches the whole job path
///
/// Invalid patterns match nothing.
pub fn filter_matches(filter: Option<&str>, job_path: &str) -> bool {
    let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
        return true;
    };
    match Regex::new(&format!("^(?:{filter})$")) {
        Ok(re) => re.is_match(job_path),
        Err(e) => {
            warn!(filter, error = %e, "Invalid global listener filter");
            false
        }
    }
}

/// Eligibility of one Target for one build
pub fn is_eligible(target: &Target, job_path: &str, explicit: Option<&str>) -> bool {
    if !target.global_listener {
        return false;
    }
    if explicit.is_some_and(|d| d == target.description) {
        debug!(destination = %target.description, "Already selected by the job");
        return false;
    }
    filter_matches(target.global_listener_filter.as_deref(), job_path)
}

/// Selects global listener Targets from the store
pub struct GlobalListener {
    store: Arc<TargetStore>,
}

impl GlobalListener {
    pub fn new(store: Arc<TargetStore>) -> Self {
        Self { store }
    }

    /// Targets to publish `build` to, given the description the job itself
    /// selected (if any)
    pub fn targets_for(&self, build: &dyn BuildContext, explicit: Option<&str>) -> Vec<Target> {
        let snapshot = self.store.snapshot();
        let selected: Vec<Target> = snapshot
            .iter()
            .filter(|t| is_eligible(t, build.job_path(), explicit))
            .cloned()
            .collect();
        debug!(
            job = build.job_path(),
            selected = selected.len(),
            configured = snapshot.len(),
            "Global listener dispatch"
        );
        selected
    }

    /// Everything one publication writes to: the job's own Target first,
    /// then the global listeners that are not that Target
    pub fn publication_targets(
        &self,
        build: &dyn BuildContext,
        explicit: Option<Target>,
    ) -> Vec<Target> {
        let listeners = self.targets_for(build, explicit.as_ref().map(|t| t.description.as_str()));
        explicit.into_iter().chain(listeners).collect()
    }
}
