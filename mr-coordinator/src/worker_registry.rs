use std::collections::BTreeMap;
use std::time::Instant;

use tracing::info;

use common::task::WorkerId;

use crate::worker_info::*;

/// Registry of every worker that has contacted the coordinator.
///
/// Workers register implicitly with their first request; there is no join
/// or leave handshake.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    /// Keyed by worker ID, kept sorted for stable status listings.
    workers: BTreeMap<WorkerId, WorkerInfo>,
}

impl WorkerRegistry {
    /// Record contact from `worker_id`, registering it if unknown.
    pub fn touch(&mut self, worker_id: &str, now: Instant) -> &mut WorkerInfo {
        if !self.workers.contains_key(worker_id) {
            info!("Worker {} joined", worker_id);
        }
        let worker = self
            .workers
            .entry(worker_id.to_string())
            .or_insert_with(|| WorkerInfo::new(now));
        worker.last_seen = now;
        worker
    }

    /// Set worker state.
    pub fn set_worker_state(&mut self, worker_id: &str, new_state: WorkerState) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            worker.set_state(new_state);
        }
    }

    pub fn record_completion(&mut self, worker_id: &str) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            worker.tasks_completed += 1;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WorkerId, &WorkerInfo)> {
        self.workers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::task::TaskKind;

    #[test]
    fn registers_on_first_contact() {
        let mut registry = WorkerRegistry::default();
        let now = Instant::now();

        registry.touch("w1", now);
        registry.touch("w1", now);
        registry.touch("w2", now);

        registry.set_worker_state("w1", WorkerState::from_task_kind(TaskKind::Reduce));
        registry.record_completion("w1");

        let workers: Vec<_> = registry
            .iter()
            .map(|(id, info)| (id.as_str(), info.state, info.tasks_completed))
            .collect();
        assert_eq!(
            workers,
            [("w1", WorkerState::Reducing, 1), ("w2", WorkerState::Free, 0)]
        );
    }
}
