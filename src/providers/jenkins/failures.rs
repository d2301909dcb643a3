//! Recursive failure aggregation across a build and its triggered sub-builds.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::future::{self, BoxFuture};
use log::{debug, warn};

use crate::error::Result;
use crate::report::FailureRecord;

use super::locator::{self, PipelineCoordinate};
use super::types::{BuildNode, NodeResult};

/// Read access to build data, abstracted so the engine can be driven by the
/// HTTP client in production and by an in-memory fixture in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Step list of one build. Fails with `BuildNotFound` on a missing
    /// build, `AuthFailure` on rejected credentials, `Network` on transport
    /// errors and `Malformed` when the response does not match the schema.
    async fn fetch_step_list(&self, coord: &PipelineCoordinate) -> Result<Vec<BuildNode>>;

    /// Console text of one step; `NodeNotFound` when the step is gone.
    async fn fetch_console_text(
        &self,
        coord: &PipelineCoordinate,
        node_id: &str,
    ) -> Result<String>;
}

/// Collects failed steps from a build, optionally walking trigger links into
/// sub-builds across pipelines.
///
/// Each traversal carries its own visited set keyed by `path/build_number`,
/// claimed atomically so concurrent branches discovering the same sub-build
/// expand it exactly once. That claim is also what makes cyclic trigger
/// graphs terminate.
pub struct FailureAggregator<'a> {
    fetcher: &'a dyn Fetcher,
    base_url: &'a str,
}

impl<'a> FailureAggregator<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, base_url: &'a str) -> Self {
        Self { fetcher, base_url }
    }

    /// Failed steps of `coord` itself; no recursion into sub-builds.
    pub async fn failure_report(
        &self,
        coord: &PipelineCoordinate,
        include_console: bool,
    ) -> Result<Vec<FailureRecord>> {
        let nodes = self.fetcher.fetch_step_list(coord).await?;
        self.level_records(coord, &nodes, include_console).await
    }

    /// Failed steps of `coord` and of every build transitively reachable
    /// through trigger links, deduplicated by coordinate.
    ///
    /// Errors fetching the root coordinate propagate. A sub-build that
    /// cannot be fetched, for any reason, contributes zero failures: trigger
    /// links routinely outlive the builds they point at once the server
    /// rotates old runs, and one dead branch must not hide failures found
    /// elsewhere in the graph.
    ///
    /// Dropping the returned future cancels every in-flight fetch and
    /// abandons still-running branches.
    pub async fn failure_report_recursive(
        &self,
        coord: &PipelineCoordinate,
        include_console: bool,
    ) -> Result<Vec<FailureRecord>> {
        let visited = Mutex::new(HashSet::new());
        self.collect(coord.clone(), include_console, &visited, true)
            .await
    }

    /// One level of the traversal. Boxed because async recursion needs an
    /// explicit indirection.
    fn collect<'s>(
        &'s self,
        coord: PipelineCoordinate,
        include_console: bool,
        visited: &'s Mutex<HashSet<String>>,
        is_root: bool,
    ) -> BoxFuture<'s, Result<Vec<FailureRecord>>> {
        Box::pin(async move {
            // Single atomic check-and-insert; the lock is never held across
            // an await.
            if !visited.lock().unwrap().insert(coord.key()) {
                debug!("Already visited {coord}, skipping");
                return Ok(Vec::new());
            }

            let nodes = match self.fetcher.fetch_step_list(&coord).await {
                Ok(nodes) => nodes,
                Err(err) if is_root => return Err(err),
                Err(err) => {
                    warn!("Skipping sub-build {coord}: {err}");
                    return Ok(Vec::new());
                }
            };

            let sub_builds = discover_sub_builds(&nodes);
            if !sub_builds.is_empty() {
                debug!("{coord} links to {} sub-build(s)", sub_builds.len());
            }

            // Console fetches for this level and sub-build traversals are
            // independent; run them concurrently and join.
            let (level, children) = tokio::join!(
                self.level_records(&coord, &nodes, include_console),
                future::join_all(
                    sub_builds
                        .into_iter()
                        .map(|sub| self.collect(sub, include_console, visited, false)),
                ),
            );

            let mut records = level?;
            for child in children {
                match child {
                    Ok(mut child_records) => records.append(&mut child_records),
                    Err(err) => warn!("Skipping sub-build branch: {err}"),
                }
            }
            Ok(records)
        })
    }

    /// FailureRecords for the failed steps of a single build.
    async fn level_records(
        &self,
        coord: &PipelineCoordinate,
        nodes: &[BuildNode],
        include_console: bool,
    ) -> Result<Vec<FailureRecord>> {
        let failed: Vec<&BuildNode> = nodes
            .iter()
            .filter(|node| node.result == Some(NodeResult::Failure))
            .collect();

        let consoles: Vec<Option<String>> = if include_console {
            future::try_join_all(failed.iter().map(|&node| async move {
                self.fetcher.fetch_console_text(coord, &node.id).await
            }))
            .await?
            .into_iter()
            .map(Some)
            .collect()
        } else {
            vec![None; failed.len()]
        };

        Ok(failed
            .into_iter()
            .zip(consoles)
            .map(|(node, console_output)| FailureRecord {
                pipeline_path: coord.path().to_string(),
                build_number: coord.build_number(),
                node_id: node.id.clone(),
                display_name: node.display_name.clone(),
                result: NodeResult::Failure,
                url: locator::node_human_url(self.base_url, coord, &node.id),
                console_output,
            })
            .collect())
    }
}

/// Resolves every step's action links into build coordinates, in discovery
/// order, deduplicated by key. Links that do not resolve to a recognized
/// coordinate are not errors; they are simply not followed.
fn discover_sub_builds(nodes: &[BuildNode]) -> Vec<PipelineCoordinate> {
    let mut seen = HashSet::new();
    let mut discovered = Vec::new();

    for node in nodes {
        for action in &node.actions {
            let Some(link) = action.link.as_ref() else {
                continue;
            };
            let Ok(coord) = locator::resolve_build_locator(&link.href) else {
                continue;
            };
            if seen.insert(coord.key()) {
                discovered.push(coord);
            }
        }
    }
    discovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JenLensError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "https://ci.example.com";

    /// In-memory stand-in for the Blue Ocean API.
    #[derive(Default)]
    struct FakeJenkins {
        builds: HashMap<String, Vec<BuildNode>>,
        consoles: HashMap<String, String>,
        auth_failures: HashSet<String>,
        step_list_calls: AtomicUsize,
        console_calls: AtomicUsize,
    }

    impl FakeJenkins {
        fn with_build(mut self, key: &str, nodes: Vec<BuildNode>) -> Self {
            self.builds.insert(key.to_string(), nodes);
            self
        }

        fn with_console(mut self, build_key: &str, node_id: &str, text: &str) -> Self {
            self.consoles
                .insert(format!("{build_key}/{node_id}"), text.to_string());
            self
        }

        fn with_auth_failure(mut self, key: &str) -> Self {
            self.auth_failures.insert(key.to_string());
            self
        }
    }

    #[async_trait]
    impl Fetcher for FakeJenkins {
        async fn fetch_step_list(&self, coord: &PipelineCoordinate) -> Result<Vec<BuildNode>> {
            self.step_list_calls.fetch_add(1, Ordering::Relaxed);
            if self.auth_failures.contains(&coord.key()) {
                return Err(JenLensError::AuthFailure { status: 401 });
            }
            self.builds
                .get(&coord.key())
                .cloned()
                .ok_or_else(|| JenLensError::BuildNotFound {
                    path: coord.path().to_string(),
                    build_number: coord.build_number(),
                })
        }

        async fn fetch_console_text(
            &self,
            coord: &PipelineCoordinate,
            node_id: &str,
        ) -> Result<String> {
            self.console_calls.fetch_add(1, Ordering::Relaxed);
            self.consoles
                .get(&format!("{}/{node_id}", coord.key()))
                .cloned()
                .ok_or_else(|| JenLensError::NodeNotFound {
                    path: coord.path().to_string(),
                    build_number: coord.build_number(),
                    node_id: node_id.to_string(),
                })
        }
    }

    fn coord(key: &str) -> PipelineCoordinate {
        locator::resolve_build_locator(key).unwrap()
    }

    fn step(id: &str, name: &str, result: NodeResult) -> BuildNode {
        BuildNode {
            id: id.to_string(),
            display_name: name.to_string(),
            result: Some(result),
            state: None,
            start_time: None,
            duration_in_millis: None,
            actions: Vec::new(),
        }
    }

    fn failed_step(id: &str, name: &str) -> BuildNode {
        step(id, name, NodeResult::Failure)
    }

    fn linked(mut node: BuildNode, href: &str) -> BuildNode {
        node.actions.push(crate::providers::jenkins::types::ActionLink {
            link: Some(crate::providers::jenkins::types::Link {
                href: href.to_string(),
            }),
        });
        node
    }

    fn run_href(key: &str) -> String {
        // What the server actually emits: a REST href to the triggered run.
        let coord = coord(key);
        format!(
            "/blue/rest/organizations/jenkins/{}/runs/{}/",
            coord.path(),
            coord.build_number()
        )
    }

    #[cfg(test)]
    mod failure_report {
        use super::*;

        #[tokio::test]
        async fn returns_one_record_per_failed_step() {
            let fake = FakeJenkins::default().with_build(
                "pipelines/Catalog/main/885",
                vec![
                    step("1", "Checkout", NodeResult::Success),
                    failed_step("5", "Run Tests"),
                ],
            );
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report(&coord("pipelines/Catalog/main/885"), false)
                .await
                .unwrap();

            assert_eq!(records.len(), 1);
            let record = &records[0];
            assert_eq!(record.pipeline_path, "pipelines/Catalog/main");
            assert_eq!(record.build_number, 885);
            assert_eq!(record.node_id, "5");
            assert_eq!(record.display_name, "Run Tests");
            assert_eq!(record.result, NodeResult::Failure);
            assert_eq!(
                record.url,
                "https://ci.example.com/blue/organizations/jenkins/pipelines/Catalog/detail/main/885/pipeline/5"
            );
            assert_eq!(record.console_output, None);
        }

        #[tokio::test]
        async fn surfaces_missing_builds() {
            let fake = FakeJenkins::default();
            let aggregator = FailureAggregator::new(&fake, BASE);

            let result = aggregator
                .failure_report(&coord("pipelines/gone/1"), false)
                .await;

            assert!(matches!(
                result,
                Err(JenLensError::BuildNotFound {
                    path,
                    build_number: 1,
                }) if path == "pipelines/gone"
            ));
        }

        #[tokio::test]
        async fn attaches_console_text_when_requested() {
            let fake = FakeJenkins::default()
                .with_build(
                    "pipelines/app/3",
                    vec![failed_step("7", "Lint")],
                )
                .with_console("pipelines/app/3", "7", "error: trailing whitespace");
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report(&coord("pipelines/app/3"), true)
                .await
                .unwrap();

            assert_eq!(
                records[0].console_output.as_deref(),
                Some("error: trailing whitespace")
            );
        }

        #[tokio::test]
        async fn surfaces_missing_console_text() {
            let fake = FakeJenkins::default()
                .with_build("pipelines/app/3", vec![failed_step("7", "Lint")]);
            let aggregator = FailureAggregator::new(&fake, BASE);

            let result = aggregator
                .failure_report(&coord("pipelines/app/3"), true)
                .await;

            assert!(matches!(
                result,
                Err(JenLensError::NodeNotFound { node_id, .. }) if node_id == "7"
            ));
        }

        #[tokio::test]
        async fn does_not_touch_consoles_when_not_requested() {
            let fake = FakeJenkins::default().with_build(
                "pipelines/app/3",
                vec![failed_step("7", "Lint"), failed_step("8", "Test")],
            );
            let aggregator = FailureAggregator::new(&fake, BASE);

            aggregator
                .failure_report(&coord("pipelines/app/3"), false)
                .await
                .unwrap();

            assert_eq!(fake.console_calls.load(Ordering::Relaxed), 0);
        }
    }

    #[cfg(test)]
    mod failure_report_recursive {
        use super::*;

        #[tokio::test]
        async fn follows_trigger_links_into_sub_builds() {
            let fake = FakeJenkins::default()
                .with_build(
                    "pipelines/Catalog/main/885",
                    vec![linked(
                        failed_step("5", "Run Tests"),
                        &run_href("pipelines/Catalog/sub/10"),
                    )],
                )
                .with_build(
                    "pipelines/Catalog/sub/10",
                    vec![failed_step("1", "Deploy")],
                );
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report_recursive(&coord("pipelines/Catalog/main/885"), false)
                .await
                .unwrap();

            assert_eq!(records.len(), 2, "one record per build expected");
            assert_eq!(records[0].pipeline_path, "pipelines/Catalog/main");
            assert_eq!(records[1].pipeline_path, "pipelines/Catalog/sub");
            assert_eq!(records[1].build_number, 10);
            assert_eq!(
                fake.console_calls.load(Ordering::Relaxed),
                0,
                "console must not be fetched unless requested"
            );
        }

        #[tokio::test]
        async fn terminates_on_cyclic_trigger_graphs() {
            let fake = FakeJenkins::default()
                .with_build(
                    "pipelines/a/1",
                    vec![linked(failed_step("1", "A step"), &run_href("pipelines/b/2"))],
                )
                .with_build(
                    "pipelines/b/2",
                    vec![linked(failed_step("1", "B step"), &run_href("pipelines/a/1"))],
                );
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report_recursive(&coord("pipelines/a/1"), false)
                .await
                .unwrap();

            assert_eq!(records.len(), 2, "each failure reported exactly once");
            assert_eq!(
                fake.step_list_calls.load(Ordering::Relaxed),
                2,
                "each build fetched exactly once"
            );
        }

        #[tokio::test]
        async fn self_links_do_not_recurse() {
            let fake = FakeJenkins::default().with_build(
                "pipelines/a/1",
                vec![linked(failed_step("1", "Step"), &run_href("pipelines/a/1"))],
            );
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report_recursive(&coord("pipelines/a/1"), false)
                .await
                .unwrap();

            assert_eq!(records.len(), 1);
            assert_eq!(fake.step_list_calls.load(Ordering::Relaxed), 1);
        }

        #[tokio::test]
        async fn missing_sub_builds_contribute_nothing() {
            let fake = FakeJenkins::default().with_build(
                "pipelines/parent/4",
                vec![linked(
                    failed_step("2", "Trigger"),
                    &run_href("pipelines/rotated-away/99"),
                )],
            );
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report_recursive(&coord("pipelines/parent/4"), false)
                .await
                .unwrap();

            assert_eq!(records.len(), 1, "parent failures survive a dead branch");
            assert_eq!(records[0].pipeline_path, "pipelines/parent");
        }

        #[tokio::test]
        async fn unreachable_sub_builds_are_swallowed() {
            let fake = FakeJenkins::default()
                .with_build(
                    "pipelines/parent/4",
                    vec![linked(
                        failed_step("2", "Trigger"),
                        &run_href("pipelines/locked/7"),
                    )],
                )
                .with_auth_failure("pipelines/locked/7");
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report_recursive(&coord("pipelines/parent/4"), false)
                .await
                .unwrap();

            assert_eq!(records.len(), 1);
        }

        #[tokio::test]
        async fn root_errors_are_fatal() {
            let fake = FakeJenkins::default().with_auth_failure("pipelines/locked/7");
            let aggregator = FailureAggregator::new(&fake, BASE);

            let missing = aggregator
                .failure_report_recursive(&coord("pipelines/gone/1"), false)
                .await;
            assert!(matches!(
                missing,
                Err(JenLensError::BuildNotFound { .. })
            ));

            let locked = aggregator
                .failure_report_recursive(&coord("pipelines/locked/7"), false)
                .await;
            assert!(matches!(locked, Err(JenLensError::AuthFailure { .. })));
        }

        #[tokio::test]
        async fn duplicate_links_expand_once() {
            let fake = FakeJenkins::default()
                .with_build(
                    "pipelines/parent/1",
                    vec![
                        linked(failed_step("1", "First"), &run_href("pipelines/shared/5")),
                        linked(step("2", "Second", NodeResult::Success), &run_href("pipelines/shared/5")),
                    ],
                )
                .with_build("pipelines/shared/5", vec![failed_step("1", "Shared")]);
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report_recursive(&coord("pipelines/parent/1"), false)
                .await
                .unwrap();

            assert_eq!(records.len(), 2);
            assert_eq!(fake.step_list_calls.load(Ordering::Relaxed), 2);
        }

        #[tokio::test]
        async fn links_on_successful_steps_are_followed() {
            // Trigger steps usually succeed even when the sub-build fails.
            let fake = FakeJenkins::default()
                .with_build(
                    "pipelines/parent/1",
                    vec![linked(
                        step("1", "Trigger sub", NodeResult::Success),
                        &run_href("pipelines/sub/2"),
                    )],
                )
                .with_build("pipelines/sub/2", vec![failed_step("3", "Integration")]);
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report_recursive(&coord("pipelines/parent/1"), false)
                .await
                .unwrap();

            assert_eq!(records.len(), 1);
            assert_eq!(records[0].pipeline_path, "pipelines/sub");
        }

        #[tokio::test]
        async fn unresolvable_links_are_ignored() {
            let fake = FakeJenkins::default().with_build(
                "pipelines/parent/1",
                vec![linked(
                    failed_step("1", "Step"),
                    "https://wiki.example.com/some/unrelated/page",
                )],
            );
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report_recursive(&coord("pipelines/parent/1"), false)
                .await
                .unwrap();

            assert_eq!(records.len(), 1);
            assert_eq!(fake.step_list_calls.load(Ordering::Relaxed), 1);
        }

        #[tokio::test]
        async fn console_fetched_once_per_failure_across_the_tree() {
            let fake = FakeJenkins::default()
                .with_build(
                    "pipelines/parent/1",
                    vec![
                        linked(failed_step("1", "Unit"), &run_href("pipelines/sub/2")),
                        failed_step("2", "Lint"),
                    ],
                )
                .with_build("pipelines/sub/2", vec![failed_step("9", "Deploy")])
                .with_console("pipelines/parent/1", "1", "unit log")
                .with_console("pipelines/parent/1", "2", "lint log")
                .with_console("pipelines/sub/2", "9", "deploy log");
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report_recursive(&coord("pipelines/parent/1"), true)
                .await
                .unwrap();

            assert_eq!(records.len(), 3);
            assert_eq!(fake.console_calls.load(Ordering::Relaxed), 3);
            assert!(records.iter().all(|r| r.console_output.is_some()));
        }

        #[tokio::test]
        async fn current_level_records_come_before_sub_build_records() {
            let fake = FakeJenkins::default()
                .with_build(
                    "pipelines/parent/1",
                    vec![
                        linked(failed_step("1", "First"), &run_href("pipelines/sub-a/1")),
                        linked(failed_step("2", "Second"), &run_href("pipelines/sub-b/1")),
                    ],
                )
                .with_build("pipelines/sub-a/1", vec![failed_step("1", "A")])
                .with_build("pipelines/sub-b/1", vec![failed_step("1", "B")]);
            let aggregator = FailureAggregator::new(&fake, BASE);

            let records = aggregator
                .failure_report_recursive(&coord("pipelines/parent/1"), false)
                .await
                .unwrap();

            let paths: Vec<&str> = records.iter().map(|r| r.pipeline_path.as_str()).collect();
            assert_eq!(
                paths,
                vec![
                    "pipelines/parent",
                    "pipelines/parent",
                    "pipelines/sub-a",
                    "pipelines/sub-b",
                ],
                "parent failures first, then sub-builds in link discovery order"
            );
        }
    }
}
