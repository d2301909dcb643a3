use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::jenkins::types::{NodeResult, NodeState};

/// One failed step encountered anywhere in a traversal, annotated with the
/// pipeline and build it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub pipeline_path: String,
    pub build_number: u64,
    pub node_id: String,
    pub display_name: String,
    pub result: NodeResult,
    pub url: String,
    /// Raw console text, present only when the caller asked for it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console_output: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailureReport {
    pub pipeline_path: String,
    pub build_number: u64,
    pub url: String,
    pub collected_at: DateTime<Utc>,
    pub recursive: bool,
    pub total_failures: usize,
    pub failures: Vec<FailureRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSummary {
    pub node_id: String,
    pub display_name: String,
    pub result: Option<NodeResult>,
    pub state: Option<NodeState>,
    pub start_time: Option<String>,
    pub duration_in_millis: Option<u64>,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BuildStatus {
    pub pipeline_path: String,
    pub build_number: u64,
    pub url: String,
    pub collected_at: DateTime<Utc>,
    pub steps: Vec<StepSummary>,
}

impl BuildStatus {
    /// Overall verdict: the worst step result present, if any step carries
    /// one. The run endpoint reports its own result too, but deriving it
    /// from the steps keeps `status` to a single request.
    pub fn worst_result(&self) -> Option<NodeResult> {
        let severity = |result: NodeResult| match result {
            NodeResult::Failure => 5,
            NodeResult::Aborted => 4,
            NodeResult::Unstable => 3,
            NodeResult::Unknown => 2,
            NodeResult::NotBuilt => 1,
            NodeResult::Success => 0,
        };
        self.steps
            .iter()
            .filter_map(|step| step.result)
            .max_by_key(|result| severity(*result))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildListingEntry {
    pub build_number: Option<u64>,
    pub result: Option<NodeResult>,
    pub state: Option<NodeState>,
    pub start_time: Option<String>,
    pub duration_in_millis: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BuildListing {
    pub pipeline_path: String,
    pub collected_at: DateTime<Utc>,
    pub builds: Vec<BuildListingEntry>,
}
