use chrono::Utc;
use log::info;

use crate::auth::Credentials;
use crate::error::Result;
use crate::report::{BuildListing, BuildListingEntry, BuildStatus, FailureReport, StepSummary};

use super::client::JenkinsClient;
use super::failures::{FailureAggregator, Fetcher};
use super::locator;

/// High-level Jenkins operations consumed by the CLI layer.
pub struct JenkinsProvider {
    client: JenkinsClient,
    base_url: String,
}

impl JenkinsProvider {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self> {
        Ok(Self {
            client: JenkinsClient::new(base_url, credentials)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Failed steps of the build `locator_text` points at, optionally
    /// recursing into triggered sub-builds and attaching console text.
    pub async fn failure_report(
        &self,
        locator_text: &str,
        recursive: bool,
        include_console: bool,
    ) -> Result<FailureReport> {
        let coord = locator::resolve_build_locator(locator_text)?;
        info!("Collecting failures for {coord}");

        let aggregator = FailureAggregator::new(&self.client, &self.base_url);
        let failures = if recursive {
            aggregator
                .failure_report_recursive(&coord, include_console)
                .await?
        } else {
            aggregator.failure_report(&coord, include_console).await?
        };

        Ok(FailureReport {
            pipeline_path: coord.path().to_string(),
            build_number: coord.build_number(),
            url: locator::human_url(&self.base_url, &coord),
            collected_at: Utc::now(),
            recursive,
            total_failures: failures.len(),
            failures,
        })
    }

    /// Step-by-step status of one build.
    pub async fn build_status(&self, locator_text: &str) -> Result<BuildStatus> {
        let coord = locator::resolve_build_locator(locator_text)?;
        info!("Fetching status for {coord}");

        let nodes = self.client.fetch_step_list(&coord).await?;
        let steps = nodes
            .into_iter()
            .map(|node| StepSummary {
                url: locator::node_human_url(&self.base_url, &coord, &node.id),
                node_id: node.id,
                display_name: node.display_name,
                result: node.result,
                state: node.state,
                start_time: node.start_time,
                duration_in_millis: node.duration_in_millis,
            })
            .collect();

        Ok(BuildStatus {
            pipeline_path: coord.path().to_string(),
            build_number: coord.build_number(),
            url: locator::human_url(&self.base_url, &coord),
            collected_at: Utc::now(),
            steps,
        })
    }

    /// Console text of the step a Blue Ocean URL points at, verbatim.
    pub async fn console_text(&self, url: &str) -> Result<String> {
        let node = locator::resolve_node_locator(url)?;
        info!("Fetching console for step {} of {}", node.node_id(), node.coordinate());
        self.client
            .fetch_console_text(node.coordinate(), node.node_id())
            .await
    }

    /// Recent runs of a pipeline, newest first by numeric build id.
    pub async fn recent_builds(&self, locator_text: &str, limit: usize) -> Result<BuildListing> {
        let job = locator::resolve_job_locator(locator_text)?;
        info!("Listing up to {limit} runs of {}", job.path());

        let runs = self.client.fetch_runs(&job, limit).await?;
        let mut builds: Vec<BuildListingEntry> = runs
            .into_iter()
            .map(|run| {
                let build_number = run.build_number();
                BuildListingEntry {
                    url: build_number
                        .map(|number| locator::human_url(&self.base_url, &job.run(number))),
                    build_number,
                    result: run.result,
                    state: run.state,
                    start_time: run.start_time,
                    duration_in_millis: run.duration_in_millis,
                }
            })
            .collect();
        builds.sort_by(|a, b| b.build_number.cmp(&a.build_number));

        Ok(BuildListing {
            pipeline_path: job.path().to_string(),
            collected_at: Utc::now(),
            builds,
        })
    }
}
