//! Correlation Query Engine (spec §4.7): joins incidents to jobs, walks
//! lineage edges, and classifies correlation status. Entirely read-only —
//! every operation goes through [`correlator_core::LineageReader`], never a
//! write-capable store handle.

use std::collections::{HashSet, VecDeque};

use correlator_core::{CoreError, LineageReader};
use correlator_domain::{EdgeType, EventType, JobRun};

use crate::model::{
    CorrelationStatus, DownstreamResult, Health, Incident, IncidentFilter, OrphanDataset, Pagination, SuggestedPattern, UpstreamResult,
};
use crate::orphan;

const DEFAULT_MAX_DEPTH: u32 = 10;

pub struct CorrelationQueryEngine<'r, R: LineageReader + ?Sized> {
    reader: &'r R,
}

impl<'r, R: LineageReader + ?Sized> CorrelationQueryEngine<'r, R> {
    pub fn new(reader: &'r R) -> Self {
        Self { reader }
    }

    pub fn query_incidents(&self, filter: IncidentFilter, pagination: Pagination) -> Result<(Vec<Incident>, i64), CoreError> {
        let (rows, total) = self.reader.test_results(filter.executed_after, pagination.limit, pagination.offset)?;
        let orphans: HashSet<String> = orphan::find_orphans(self.reader)?.into_iter().map(|o| o.dataset_urn).collect();

        let incidents = rows.into_iter().map(|(id, test_result)| self.build_incident(id, test_result, &orphans)).collect::<Result<Vec<_>, _>>()?;
        Ok((incidents, total))
    }

    pub fn query_incident_by_id(&self, id: i64) -> Result<Option<Incident>, CoreError> {
        let Some((id, test_result)) = self.reader.test_result_by_id(id)? else { return Ok(None) };
        let orphans: HashSet<String> = orphan::find_orphans(self.reader)?.into_iter().map(|o| o.dataset_urn).collect();
        Ok(Some(self.build_incident(id, test_result, &orphans)?))
    }

    fn build_incident(&self, id: i64, test_result: correlator_domain::TestResult, orphans: &HashSet<String>) -> Result<Incident, CoreError> {
        let job_run_id = test_result.job_run_id.clone();
        let status = self.classify(job_run_id.as_deref(), &test_result.dataset_urn, orphans);

        let job_run = match job_run_id.as_deref() {
            Some(id) => match self.reader.find_job_run(id)? {
                Some(run) => Some(self.resolve_job_status(run)?),
                None => None,
            },
            None => None,
        };

        Ok(Incident { id, test_result, job_run, status })
    }

    /// `unknown` when the incident carries no run id at all; `orphan` when
    /// the dataset has no producing run; `correlated` otherwise. `unknown`
    /// strictly dominates `orphan`.
    fn classify(&self, job_run_id: Option<&str>, dataset_urn: &str, orphans: &HashSet<String>) -> CorrelationStatus {
        if job_run_id.map(str::is_empty).unwrap_or(true) {
            CorrelationStatus::Unknown
        } else if orphans.contains(dataset_urn) {
            CorrelationStatus::Orphan
        } else {
            CorrelationStatus::Correlated
        }
    }

    /// If a job's own status never left a non-terminal state and its
    /// immediate parent already finished, surface the parent's status and
    /// completion time instead (spec §4.7, "job-status resolution") — this
    /// covers orchestration-only jobs that never emit their own COMPLETE.
    fn resolve_job_status(&self, run: JobRun) -> Result<JobRun, CoreError> {
        let is_non_terminal = matches!(run.current_state, EventType::Running | EventType::Start | EventType::Other);
        if !is_non_terminal {
            return Ok(run);
        }
        let Some(parent) = self.reader.find_parent_job_run(&run.job_run_id)? else { return Ok(run) };
        if !parent.current_state.is_terminal() {
            return Ok(run);
        }
        Ok(JobRun { current_state: parent.current_state, completed_at: parent.completed_at, ..run })
    }

    /// BFS from `run_id`'s produced datasets, through consuming runs, over
    /// `output` edges. `depth` starts at 1 for the first hop out of the run.
    pub fn query_downstream_with_parents(&self, run_id: &str, max_depth: Option<u32>) -> Result<Vec<DownstreamResult>, CoreError> {
        let max_depth = max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        let mut visited: HashSet<String> = HashSet::new();
        let mut results = Vec::new();
        let mut queue: VecDeque<(String, u32, Option<String>)> = VecDeque::new();
        queue.push_back((run_id.to_string(), 0, None));

        while let Some((current_run, depth, parent_urn)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let produced = self.reader.edges_for_job_run(&current_run)?;
            for edge in produced.into_iter().filter(|e| e.edge_type == EdgeType::Output) {
                if !visited.insert(edge.dataset_urn.clone()) {
                    continue;
                }
                let name = dataset_name(&edge.dataset_urn);
                let producer = self.reader.find_job_run(&current_run)?.map(|r| r.producer).unwrap_or_default();
                results.push(DownstreamResult { dataset_urn: edge.dataset_urn.clone(), name, depth: depth + 1, parent_urn: parent_urn.clone(), producer });

                for consumer in self.reader.job_runs_for_dataset(&edge.dataset_urn, EdgeType::Input)? {
                    queue.push_back((consumer.job_run_id, depth + 1, Some(edge.dataset_urn.clone())));
                }
            }
        }

        Ok(results)
    }

    /// Symmetric walk over `input` edges, from the producing runs of
    /// `dataset_urn` upward through whatever they themselves consumed.
    pub fn query_upstream_with_children(&self, dataset_urn: &str, max_depth: Option<u32>) -> Result<Vec<UpstreamResult>, CoreError> {
        let max_depth = max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(dataset_urn.to_string());
        let mut results = Vec::new();
        let mut queue: VecDeque<(String, u32, Option<String>)> = VecDeque::new();
        queue.push_back((dataset_urn.to_string(), 0, None));

        while let Some((current_urn, depth, child_urn)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for producer_run in self.reader.job_runs_for_dataset(&current_urn, EdgeType::Output)? {
                let consumed = self.reader.edges_for_job_run(&producer_run.job_run_id)?;
                for edge in consumed.into_iter().filter(|e| e.edge_type == EdgeType::Input) {
                    if !visited.insert(edge.dataset_urn.clone()) {
                        continue;
                    }
                    let name = dataset_name(&edge.dataset_urn);
                    results.push(UpstreamResult {
                        dataset_urn: edge.dataset_urn.clone(),
                        name,
                        depth: depth + 1,
                        child_urn: child_urn.clone().or_else(|| Some(current_urn.clone())),
                        producer: producer_run.producer.clone(),
                    });
                    queue.push_back((edge.dataset_urn.clone(), depth + 1, Some(current_urn.clone())));
                }
            }
        }

        Ok(results)
    }

    /// Ancestors of `run_id` via `parentRunID`, ordered root-first, ending at
    /// the immediate parent (`run_id` itself is not included).
    pub fn query_orchestration_chain(&self, run_id: &str, max_depth: Option<u32>) -> Result<Vec<JobRun>, CoreError> {
        let max_depth = max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        let mut chain = Vec::new();
        let mut current = run_id.to_string();
        let mut visited = HashSet::new();
        visited.insert(current.clone());

        for _ in 0..max_depth {
            let Some(parent) = self.reader.find_parent_job_run(&current)? else { break };
            if !visited.insert(parent.job_run_id.clone()) {
                break;
            }
            current = parent.job_run_id.clone();
            chain.push(parent);
        }

        chain.reverse();
        Ok(chain)
    }

    pub fn query_orphan_datasets(&self) -> Result<Vec<OrphanDataset>, CoreError> {
        orphan::find_orphans(self.reader)
    }

    pub fn query_suggested_patterns(&self) -> Result<Vec<SuggestedPattern>, CoreError> {
        let orphans = orphan::find_orphans(self.reader)?;
        Ok(orphan::suggest_patterns(&orphans))
    }

    pub fn query_correlation_health(&self) -> Result<Health, CoreError> {
        let total_datasets = self.reader.all_dataset_urns()?.len() as i64;
        let orphan_count = orphan::find_orphans(self.reader)?.len() as i64;
        Ok(Health::compute(total_datasets, (total_datasets - orphan_count).max(0)))
    }
}

fn dataset_name(urn: &str) -> String {
    correlator_domain::parse_dataset_urn(urn).map(|(_, name)| name).unwrap_or_else(|_| urn.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};
    use correlator_domain::{Dataset, LineageEdge, TestResult, TestStatus};

    use super::*;

    #[derive(Default)]
    struct FakeReader {
        job_runs: Mutex<HashMap<String, JobRun>>,
        edges: Mutex<Vec<LineageEdge>>,
        test_results: Mutex<Vec<(i64, TestResult)>>,
        #[allow(dead_code)]
        datasets: Mutex<Vec<Dataset>>,
    }

    impl LineageReader for FakeReader {
        fn find_job_run(&self, job_run_id: &str) -> Result<Option<JobRun>, CoreError> {
            Ok(self.job_runs.lock().unwrap().get(job_run_id).cloned())
        }

        fn find_parent_job_run(&self, job_run_id: &str) -> Result<Option<JobRun>, CoreError> {
            let runs = self.job_runs.lock().unwrap();
            let Some(run) = runs.get(job_run_id) else { return Ok(None) };
            Ok(run.parent_run_id.as_ref().and_then(|p| runs.get(p)).cloned())
        }

        fn outgoing_edges(&self, dataset_urn: &str) -> Result<Vec<LineageEdge>, CoreError> {
            Ok(self.edges.lock().unwrap().iter().filter(|e| e.dataset_urn == dataset_urn && e.edge_type == EdgeType::Input).cloned().collect())
        }

        fn incoming_edges(&self, dataset_urn: &str) -> Result<Vec<LineageEdge>, CoreError> {
            Ok(self.edges.lock().unwrap().iter().filter(|e| e.dataset_urn == dataset_urn && e.edge_type == EdgeType::Output).cloned().collect())
        }

        fn job_runs_for_dataset(&self, dataset_urn: &str, edge_type: EdgeType) -> Result<Vec<JobRun>, CoreError> {
            let ids: Vec<String> = self
                .edges
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.dataset_urn == dataset_urn && e.edge_type == edge_type)
                .map(|e| e.job_run_id.clone())
                .collect();
            let runs = self.job_runs.lock().unwrap();
            Ok(ids.into_iter().filter_map(|id| runs.get(&id).cloned()).collect())
        }

        fn edges_for_job_run(&self, job_run_id: &str) -> Result<Vec<LineageEdge>, CoreError> {
            Ok(self.edges.lock().unwrap().iter().filter(|e| e.job_run_id == job_run_id).cloned().collect())
        }

        fn all_dataset_urns(&self) -> Result<Vec<String>, CoreError> {
            Ok(self.edges.lock().unwrap().iter().map(|e| e.dataset_urn.clone()).collect::<HashSet<_>>().into_iter().collect())
        }

        fn dataset_urns_with_output_edge(&self) -> Result<Vec<String>, CoreError> {
            Ok(self
                .edges
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.edge_type == EdgeType::Output)
                .map(|e| e.dataset_urn.clone())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect())
        }

        fn test_results(&self, executed_after: Option<DateTime<Utc>>, limit: i64, offset: i64) -> Result<(Vec<(i64, TestResult)>, i64), CoreError> {
            let all = self.test_results.lock().unwrap();
            let mut filtered: Vec<(i64, TestResult)> =
                all.iter().filter(|(_, r)| executed_after.map(|a| r.executed_at >= a).unwrap_or(true)).cloned().collect();
            filtered.sort_by(|a, b| b.1.executed_at.cmp(&a.1.executed_at).then(b.0.cmp(&a.0)));
            let total = filtered.len() as i64;
            let page = filtered.into_iter().skip(offset as usize).take(limit as usize).collect();
            Ok((page, total))
        }

        fn test_result_by_id(&self, id: i64) -> Result<Option<(i64, TestResult)>, CoreError> {
            Ok(self.test_results.lock().unwrap().iter().find(|(i, _)| *i == id).cloned())
        }
    }

    fn job_run(id: &str, producer: &str, state: EventType, parent: Option<&str>) -> JobRun {
        JobRun {
            job_run_id: id.into(),
            run_id: id.into(),
            job_name: "job".into(),
            job_namespace: "ns".into(),
            producer: producer.into(),
            current_state: state,
            event_time: DateTime::<Utc>::from_timestamp(100, 0).unwrap(),
            started_at: None,
            completed_at: if state.is_terminal() { DateTime::<Utc>::from_timestamp(200, 0) } else { None },
            parent_run_id: parent.map(String::from),
        }
    }

    fn test_result(id: i64, dataset_urn: &str, job_run_id: Option<&str>, seconds: i64) -> (i64, TestResult) {
        (
            id,
            TestResult {
                test_name: "not_null".into(),
                test_type: "dbt".into(),
                dataset_urn: dataset_urn.into(),
                job_run_id: job_run_id.map(String::from),
                status: TestStatus::Failed,
                message: None,
                metadata: serde_json::Value::default(),
                executed_at: DateTime::<Utc>::from_timestamp(seconds, 0).unwrap(),
                duration_ms: None,
            },
        )
    }

    #[test]
    fn incident_without_job_run_id_is_unknown() {
        let reader = FakeReader::default();
        reader.test_results.lock().unwrap().push(test_result(1, "postgresql://x/orders", None, 100));
        let engine = CorrelationQueryEngine::new(&reader);
        let (incidents, total) = engine.query_incidents(IncidentFilter::default(), Pagination::default()).unwrap();
        assert_eq!(total, 1);
        assert!(matches!(incidents[0].status, CorrelationStatus::Unknown));
    }

    #[test]
    fn incident_on_unproduced_dataset_is_orphan() {
        let reader = FakeReader::default();
        reader.job_runs.lock().unwrap().insert("R1".into(), job_run("R1", "dbt", EventType::Complete, None));
        reader.test_results.lock().unwrap().push(test_result(1, "postgresql://x/orders", Some("R1"), 100));
        let engine = CorrelationQueryEngine::new(&reader);
        let (incidents, _) = engine.query_incidents(IncidentFilter::default(), Pagination::default()).unwrap();
        assert!(matches!(incidents[0].status, CorrelationStatus::Orphan));
    }

    #[test]
    fn incident_on_produced_dataset_is_correlated() {
        let reader = FakeReader::default();
        reader.job_runs.lock().unwrap().insert("R1".into(), job_run("R1", "dbt", EventType::Complete, None));
        reader.edges.lock().unwrap().push(LineageEdge { job_run_id: "R1".into(), dataset_urn: "postgresql://x/orders".into(), edge_type: EdgeType::Output });
        reader.test_results.lock().unwrap().push(test_result(1, "postgresql://x/orders", Some("R1"), 100));
        let engine = CorrelationQueryEngine::new(&reader);
        let (incidents, _) = engine.query_incidents(IncidentFilter::default(), Pagination::default()).unwrap();
        assert!(matches!(incidents[0].status, CorrelationStatus::Correlated));
    }

    #[test]
    fn job_status_backfills_from_terminal_parent() {
        let reader = FakeReader::default();
        reader.job_runs.lock().unwrap().insert("parent".into(), job_run("parent", "airflow", EventType::Complete, None));
        reader.job_runs.lock().unwrap().insert("child".into(), job_run("child", "dbt", EventType::Running, Some("parent")));
        reader.test_results.lock().unwrap().push(test_result(1, "postgresql://x/orders", Some("child"), 100));
        let engine = CorrelationQueryEngine::new(&reader);
        let (incidents, _) = engine.query_incidents(IncidentFilter::default(), Pagination::default()).unwrap();
        let run = incidents[0].job_run.as_ref().unwrap();
        assert_eq!(run.current_state, EventType::Complete);
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn downstream_walk_is_cycle_safe_and_depth_bounded() {
        let reader = FakeReader::default();
        reader.job_runs.lock().unwrap().insert("R1".into(), job_run("R1", "dbt", EventType::Complete, None));
        reader.job_runs.lock().unwrap().insert("R2".into(), job_run("R2", "dbt", EventType::Complete, None));
        let mut edges = reader.edges.lock().unwrap();
        edges.push(LineageEdge { job_run_id: "R1".into(), dataset_urn: "postgresql://x/a".into(), edge_type: EdgeType::Output });
        edges.push(LineageEdge { job_run_id: "R2".into(), dataset_urn: "postgresql://x/a".into(), edge_type: EdgeType::Input });
        edges.push(LineageEdge { job_run_id: "R2".into(), dataset_urn: "postgresql://x/b".into(), edge_type: EdgeType::Output });
        // cycle: b feeds back into R1
        edges.push(LineageEdge { job_run_id: "R1".into(), dataset_urn: "postgresql://x/b".into(), edge_type: EdgeType::Input });
        drop(edges);

        let engine = CorrelationQueryEngine::new(&reader);
        let results = engine.query_downstream_with_parents("R1", Some(10)).unwrap();
        let urns: Vec<&str> = results.iter().map(|r| r.dataset_urn.as_str()).collect();
        assert!(urns.contains(&"postgresql://x/a"));
        assert!(urns.contains(&"postgresql://x/b"));
        assert_eq!(urns.len(), 2, "cycle must not revisit a or b a second time");
    }

    #[test]
    fn orchestration_chain_is_root_first() {
        let reader = FakeReader::default();
        reader.job_runs.lock().unwrap().insert("root".into(), job_run("root", "airflow", EventType::Complete, None));
        reader.job_runs.lock().unwrap().insert("mid".into(), job_run("mid", "airflow", EventType::Complete, Some("root")));
        reader.job_runs.lock().unwrap().insert("leaf".into(), job_run("leaf", "dbt", EventType::Complete, Some("mid")));
        let engine = CorrelationQueryEngine::new(&reader);
        let chain = engine.query_orchestration_chain("leaf", None).unwrap();
        assert_eq!(chain.iter().map(|r| r.job_run_id.as_str()).collect::<Vec<_>>(), vec!["root", "mid"]);
    }

    #[test]
    fn health_is_one_when_no_datasets() {
        let reader = FakeReader::default();
        let engine = CorrelationQueryEngine::new(&reader);
        let health = engine.query_correlation_health().unwrap();
        assert_eq!(health.correlation_rate, 1.0);
    }
}
