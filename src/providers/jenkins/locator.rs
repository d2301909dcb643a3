use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{JenLensError, Result};

/// API prefix shared by every Blue Ocean REST request.
pub const API_ROOT: &str = "blue/rest/organizations";

/// Blue Ocean organization. Stock Jenkins installations expose exactly one.
pub const ORGANIZATION: &str = "jenkins";

/// Root token prefixing every canonical pipeline path.
const ROOT_TOKEN: &str = "pipelines";
const ROOT_PREFIX: &str = "pipelines/";

const BUILD_FORMATS: &str = "a job URL (…/job/NAME/42/), a run URL or path \
     (pipelines/NAME/runs/42), a short path (pipelines/NAME/42), or a Blue \
     Ocean detail URL";
const JOB_FORMATS: &str = "a job URL (…/job/NAME/) or a pipeline path (pipelines/NAME)";
const NODE_FORMATS: &str =
    "a Blue Ocean step URL (…/pipelines/NAME/detail/BRANCH/42/pipeline/NODE)";

/// Characters escaped when a validated segment is written into a URL path.
/// Validated segments only ever need the space escaped, but the set matches
/// what browsers refuse to emit raw in a path component.
const SEGMENT_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Canonical address of one numbered build of a pipeline.
///
/// `path` is always `pipelines/<seg>(/<seg>)*` with every segment already
/// validated against the safe-character allow-list. Constructed exclusively
/// by the resolve functions in this module; downstream code treats it as the
/// only valid key for addressing a build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineCoordinate {
    path: String,
    build_number: u64,
}

impl PipelineCoordinate {
    fn from_segments(segments: &[String], build_number: u64) -> Self {
        Self {
            path: format!("{ROOT_TOKEN}/{}", segments.join("/")),
            build_number,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn build_number(&self) -> u64 {
        self.build_number
    }

    /// Deduplication key used by the failure aggregation engine.
    pub fn key(&self) -> String {
        format!("{}/{}", self.path, self.build_number)
    }

    /// Path segments without the root token.
    pub(crate) fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').skip(1)
    }
}

impl std::fmt::Display for PipelineCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{}", self.path, self.build_number)
    }
}

/// Canonical address of a pipeline without a build number, used when listing
/// recent runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCoordinate {
    path: String,
}

impl JobCoordinate {
    fn from_segments(segments: &[String]) -> Self {
        Self {
            path: format!("{ROOT_TOKEN}/{}", segments.join("/")),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Coordinate of one numbered run of this pipeline.
    pub fn run(&self, build_number: u64) -> PipelineCoordinate {
        PipelineCoordinate {
            path: self.path.clone(),
            build_number,
        }
    }

    pub(crate) fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').skip(1)
    }
}

/// A build coordinate narrowed to one step of its execution graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCoordinate {
    coordinate: PipelineCoordinate,
    node_id: String,
}

impl NodeCoordinate {
    pub fn coordinate(&self) -> &PipelineCoordinate {
        &self.coordinate
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

/// A structurally matched build locator, segments still percent-encoded.
struct RawBuild {
    segments: Vec<String>,
    build_number: u64,
}

/// A structurally matched Blue Ocean detail URL.
struct RawDetail {
    segments: Vec<String>,
    branch: String,
    build_number: u64,
    node_id: Option<String>,
}

/// Resolves free-form text into a build coordinate.
///
/// Tries each supported format in order and takes the first structural
/// match: classic job URLs (`…/job/A/job/B/42/`), run URLs and bare paths
/// (`pipelines/A/B/runs/42`), the short bare form (`pipelines/A/B/42`), and
/// Blue Ocean detail URLs. Segments are percent-decoded before validation,
/// so pasted browser URLs work as-is.
///
/// # Errors
///
/// `InvalidLocator` when no format matches or any decoded segment falls
/// outside the `[A-Za-z0-9_.\- ]` allow-list (including `.` and `..`).
pub fn resolve_build_locator(text: &str) -> Result<PipelineCoordinate> {
    let text = text.trim();
    let matchers: &[fn(&str) -> Option<RawBuild>] = &[
        match_job_url,
        match_run_path,
        match_detail_build,
        match_bare_build,
    ];

    let raw = matchers
        .iter()
        .find_map(|matcher| matcher(text))
        .ok_or_else(|| invalid(text, BUILD_FORMATS))?;

    let segments = decode_segments(text, &raw.segments)?;
    Ok(PipelineCoordinate::from_segments(
        &segments,
        raw.build_number,
    ))
}

/// Resolves free-form text into a pipeline coordinate without a build
/// number: job URLs (`…/job/A/job/B/`) or pipeline paths (`pipelines/A/B`).
pub fn resolve_job_locator(text: &str) -> Result<JobCoordinate> {
    let text = text.trim();
    let matchers: &[fn(&str) -> Option<Vec<String>>] = &[match_job_url_path, match_pipeline_path];

    let raw = matchers
        .iter()
        .find_map(|matcher| matcher(text))
        .ok_or_else(|| invalid(text, JOB_FORMATS))?;

    let segments = decode_segments(text, &raw)?;
    Ok(JobCoordinate::from_segments(&segments))
}

/// Resolves a Blue Ocean step URL
/// (`…/pipelines/<segs>/detail/<branch>/<number>/pipeline/<node>`) into a
/// build coordinate plus the step's node id.
pub fn resolve_node_locator(url: &str) -> Result<NodeCoordinate> {
    let url = url.trim();
    let raw = root_token_suffixes(url)
        .find_map(|rest| parse_detail_form(rest).filter(|detail| detail.node_id.is_some()))
        .ok_or_else(|| invalid(url, NODE_FORMATS))?;

    let segments = detail_segments(url, &raw)?;
    let node_id = match &raw.node_id {
        Some(id) => decode_segment(url, id)?,
        None => return Err(invalid(url, NODE_FORMATS)),
    };

    Ok(NodeCoordinate {
        coordinate: PipelineCoordinate::from_segments(&segments, raw.build_number),
        node_id,
    })
}

/// `GET` path for a build's step list.
pub fn nodes_request_path(coord: &PipelineCoordinate) -> String {
    format!(
        "/{API_ROOT}/{ORGANIZATION}/{}/runs/{}/nodes/",
        encoded_path(coord.segments()),
        coord.build_number()
    )
}

/// `GET` path for one step's console text.
pub fn console_request_path(coord: &PipelineCoordinate, node_id: &str) -> String {
    format!(
        "/{API_ROOT}/{ORGANIZATION}/{}/runs/{}/nodes/{}/log/",
        encoded_path(coord.segments()),
        coord.build_number(),
        encode_segment(node_id)
    )
}

/// `GET` path listing a pipeline's most recent runs.
pub fn runs_request_path(job: &JobCoordinate, limit: usize) -> String {
    format!(
        "/{API_ROOT}/{ORGANIZATION}/{}/runs/?limit={limit}",
        encoded_path(job.segments())
    )
}

/// Clickable Blue Ocean URL for a build.
///
/// Blue Ocean addresses a run as `…/<pipeline>/detail/<branch>/<number>/`,
/// where `<branch>` repeats the pipeline name for non-multibranch jobs. The
/// output re-parses through [`resolve_build_locator`].
pub fn human_url(base_url: &str, coord: &PipelineCoordinate) -> String {
    let segments: Vec<&str> = coord.segments().collect();
    let branch = segments.last().copied().unwrap_or(ROOT_TOKEN);
    let prefix = if segments.len() > 1 {
        &segments[..segments.len() - 1]
    } else {
        &segments[..]
    };
    let prefix = prefix
        .iter()
        .map(|seg| encode_segment(seg))
        .collect::<Vec<_>>()
        .join("/");

    format!(
        "{}/blue/organizations/{ORGANIZATION}/{ROOT_TOKEN}/{prefix}/detail/{}/{}/pipeline",
        base_url.trim_end_matches('/'),
        encode_segment(branch),
        coord.build_number()
    )
}

/// Clickable Blue Ocean URL for one step of a build. The output re-parses
/// through [`resolve_node_locator`].
pub fn node_human_url(base_url: &str, coord: &PipelineCoordinate, node_id: &str) -> String {
    format!(
        "{}/{}",
        human_url(base_url, coord),
        encode_segment(node_id)
    )
}

// --- format matchers -------------------------------------------------------

/// `…/job/<seg>(/job/<seg>)*/<number>/`
fn match_job_url(text: &str) -> Option<RawBuild> {
    let (_, rest) = text.split_once("/job/")?;
    let mut parts = rest.split('/');
    let mut segments = vec![parts.next()?.to_string()];

    loop {
        match parts.next() {
            Some("job") => segments.push(parts.next()?.to_string()),
            Some(part) => {
                let build_number = part.parse().ok()?;
                if parts.any(|trailing| !trailing.is_empty()) {
                    return None;
                }
                return Some(RawBuild {
                    segments,
                    build_number,
                });
            }
            None => return None,
        }
    }
}

/// `[…/]pipelines/<segs>/runs/<number>[/]`, URL or bare.
fn match_run_path(text: &str) -> Option<RawBuild> {
    root_token_suffixes(text).find_map(parse_run_form)
}

fn parse_run_form(rest: &str) -> Option<RawBuild> {
    let mut parts = rest.split('/');
    let mut segments = Vec::new();

    loop {
        let part = parts.next()?;
        if part == "runs" {
            break;
        }
        segments.push(part.to_string());
    }
    if segments.is_empty() {
        return None;
    }

    let build_number = parts.next()?.parse().ok()?;
    if parts.any(|trailing| !trailing.is_empty()) {
        return None;
    }
    Some(RawBuild {
        segments,
        build_number,
    })
}

/// Blue Ocean detail URL without a node id, the form [`human_url`] emits.
fn match_detail_build(text: &str) -> Option<RawBuild> {
    let raw = root_token_suffixes(text)
        .find_map(parse_detail_form)
        .filter(|detail| detail.node_id.is_none())?;
    let segments = merge_branch(raw.segments, raw.branch);
    Some(RawBuild {
        segments,
        build_number: raw.build_number,
    })
}

/// Bare `pipelines/<segs>/<number>` with no `runs` separator.
fn match_bare_build(text: &str) -> Option<RawBuild> {
    let rest = text.strip_prefix(ROOT_PREFIX)?;
    let mut parts: Vec<&str> = rest.split('/').collect();
    while parts.last() == Some(&"") {
        parts.pop();
    }

    let build_number = parts.pop()?.parse().ok()?;
    if parts.is_empty() {
        return None;
    }
    Some(RawBuild {
        segments: parts.into_iter().map(str::to_string).collect(),
        build_number,
    })
}

/// `…/job/<seg>(/job/<seg>)*[/]` with no trailing build number.
fn match_job_url_path(text: &str) -> Option<Vec<String>> {
    let (_, rest) = text.split_once("/job/")?;
    let mut parts = rest.split('/');
    let mut segments = vec![parts.next()?.to_string()];

    loop {
        match parts.next() {
            Some("job") => segments.push(parts.next()?.to_string()),
            Some("") | None => break,
            Some(_) => return None,
        }
    }
    if parts.any(|trailing| !trailing.is_empty()) {
        return None;
    }
    Some(segments)
}

/// `[…/]pipelines/<segs>[/]` with no run component.
fn match_pipeline_path(text: &str) -> Option<Vec<String>> {
    root_token_suffixes(text).find_map(|rest| {
        let mut parts: Vec<&str> = rest.split('/').collect();
        while parts.last() == Some(&"") {
            parts.pop();
        }
        if parts.is_empty()
            || parts
                .iter()
                .any(|part| part.is_empty() || *part == "runs" || *part == "detail")
        {
            return None;
        }
        Some(parts.into_iter().map(str::to_string).collect())
    })
}

/// `<segs>/detail/<branch>/<number>[/pipeline[/<node>]]`
fn parse_detail_form(rest: &str) -> Option<RawDetail> {
    let mut parts = rest.split('/');
    let mut segments = Vec::new();

    loop {
        let part = parts.next()?;
        if part == "detail" {
            break;
        }
        segments.push(part.to_string());
    }
    if segments.is_empty() {
        return None;
    }

    let branch = parts.next().filter(|part| !part.is_empty())?.to_string();
    let build_number = parts.next()?.parse().ok()?;

    let node_id = match parts.next() {
        None | Some("") => None,
        Some("pipeline") => parts.next().filter(|part| !part.is_empty()).map(str::to_string),
        Some(_) => return None,
    };
    if parts.any(|trailing| !trailing.is_empty()) {
        return None;
    }

    Some(RawDetail {
        segments,
        branch,
        build_number,
        node_id,
    })
}

/// Yields the text following each `pipelines/` token that sits at the start
/// of the input or immediately after a slash.
fn root_token_suffixes(text: &str) -> impl Iterator<Item = &str> {
    text.match_indices(ROOT_PREFIX).filter_map(move |(idx, _)| {
        let at_boundary = idx == 0 || text.as_bytes()[idx - 1] == b'/';
        at_boundary.then(|| &text[idx + ROOT_PREFIX.len()..])
    })
}

// --- validation ------------------------------------------------------------

fn decode_segments(input: &str, raw: &[String]) -> Result<Vec<String>> {
    raw.iter()
        .map(|segment| decode_segment(input, segment))
        .collect()
}

fn decode_segment(input: &str, raw: &str) -> Result<String> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| invalid(input, "UTF-8 path segments"))?;
    if !is_safe_segment(&decoded) {
        return Err(invalid(
            input,
            "path segments limited to letters, digits, `_`, `-`, `.` and spaces",
        ));
    }
    Ok(decoded.into_owned())
}

/// The server accepts a far wider character set in job names, but anything
/// outside this allow-list is refused at the boundary: these strings are
/// concatenated into HTTP request paths downstream.
fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
}

/// Appends the detail URL's branch as the final path segment unless it
/// merely repeats the last one (Blue Ocean does that for plain jobs).
fn merge_branch(mut segments: Vec<String>, branch: String) -> Vec<String> {
    if segments.last() != Some(&branch) {
        segments.push(branch);
    }
    segments
}

fn detail_segments(input: &str, raw: &RawDetail) -> Result<Vec<String>> {
    let segments = decode_segments(input, &raw.segments)?;
    let branch = decode_segment(input, &raw.branch)?;
    Ok(merge_branch(segments, branch))
}

fn encoded_path<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let encoded = segments
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/");
    format!("{ROOT_TOKEN}/{encoded}")
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ESCAPES).to_string()
}

fn invalid(input: &str, expected: &str) -> JenLensError {
    JenLensError::InvalidLocator {
        input: input.to_owned(),
        expected: expected.to_owned(),
    }
}
