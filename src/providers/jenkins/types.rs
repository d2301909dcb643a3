use serde::{Deserialize, Serialize};

/// Final result of a build or step as reported by Blue Ocean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeResult {
    Success,
    Failure,
    Unstable,
    Aborted,
    NotBuilt,
    /// Anything the server reports that this client does not model.
    #[serde(other)]
    Unknown,
}

impl NodeResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Unstable => "UNSTABLE",
            Self::Aborted => "ABORTED",
            Self::NotBuilt => "NOT_BUILT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Execution state of a build or step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    Finished,
    Running,
    Queued,
    Paused,
    Skipped,
    NotBuilt,
    #[serde(other)]
    Unknown,
}

/// One step (node) of a build's execution graph.
///
/// Deserialized from `…/runs/<n>/nodes/`. A `result` of `None` means the
/// step is still running or a result does not apply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildNode {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub result: Option<NodeResult>,
    #[serde(default)]
    pub state: Option<NodeState>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration_in_millis: Option<u64>,
    /// Outbound action links; a triggered sub-build shows up here as an
    /// action whose `link.href` points at another pipeline's run.
    #[serde(default)]
    pub actions: Vec<ActionLink>,
}

/// An action attached to a step. Only the optional link matters here; the
/// server also sends `_class` and assorted metadata this client ignores.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionLink {
    #[serde(default)]
    pub link: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

/// One entry of a pipeline's run listing (`…/runs/?limit=<n>`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,
    #[serde(default)]
    pub result: Option<NodeResult>,
    #[serde(default)]
    pub state: Option<NodeState>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration_in_millis: Option<u64>,
}

impl RunSummary {
    /// Run ids arrive as strings but are build numbers; compare numerically
    /// so run 100 sorts above run 99.
    pub fn build_number(&self) -> Option<u64> {
        self.id.parse().ok()
    }
}
