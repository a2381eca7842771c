//! GMP command builders and response decoding.
//!
//! Every interpolated value is XML-escaped. Responses are decoded with
//! quick-xml after stripping any preamble the control program printed.

use crate::core::{GmpError, ParseError};
use crate::transport::strip_preamble;

use quick_xml::escape::escape;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// `<create_target>` with a fixed port list.
pub fn create_target(name: &str, hosts: &str, port_list_id: &str) -> String {
    format!(
        "<create_target><name>{}</name><hosts>{}</hosts><port_list id=\"{}\"/></create_target>",
        escape(name),
        escape(hosts),
        escape(port_list_id)
    )
}

/// `<create_task>` binding a target to a scan config and scanner.
pub fn create_task(name: &str, target_id: &str, config_id: &str, scanner_id: &str) -> String {
    format!(
        "<create_task><name>{}</name><target id=\"{}\"/><config id=\"{}\"/><scanner id=\"{}\"/></create_task>",
        escape(name),
        escape(target_id),
        escape(config_id),
        escape(scanner_id)
    )
}

/// `<start_task>`.
pub fn start_task(task_id: &str) -> String {
    format!("<start_task task_id=\"{}\"/>", escape(task_id))
}

/// `<get_tasks>` for a single task, with details.
pub fn get_task(task_id: &str) -> String {
    format!("<get_tasks task_id=\"{}\" details=\"1\"/>", escape(task_id))
}

/// `<get_reports>` for a single report in the given format, unpaginated.
pub fn get_report(report_id: &str, format_id: &str) -> String {
    format!(
        "<get_reports report_id=\"{}\" format_id=\"{}\" details=\"1\" ignore_pagination=\"1\"/>",
        escape(report_id),
        escape(format_id)
    )
}

/// `<get_version/>`.
pub fn get_version() -> &'static str {
    "<get_version/>"
}

/// Root attributes shared by every `*_response` element.
#[derive(Debug, Default, Deserialize)]
struct ResponseRoot {
    #[serde(rename = "@id", default)]
    id: Option<String>,
    #[serde(rename = "@status", default)]
    status: Option<String>,
    #[serde(rename = "@status_text", default)]
    status_text: Option<String>,
}

/// Decoded `<get_tasks_response>`.
#[derive(Debug, Default, Deserialize)]
struct TasksResponse {
    #[serde(rename = "@status", default)]
    status: Option<String>,
    #[serde(rename = "@status_text", default)]
    status_text: Option<String>,
    #[serde(default)]
    task: Vec<RawTask>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTask {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<TextNode>,
    #[serde(default)]
    target: Option<RawTarget>,
    #[serde(default)]
    last_report: Option<ReportLink>,
    #[serde(default)]
    current_report: Option<ReportLink>,
}

#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTarget {
    #[serde(rename = "@id", default)]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportLink {
    #[serde(default)]
    report: Option<ReportRef>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportRef {
    #[serde(rename = "@id", default)]
    id: Option<String>,
}

/// Decoded `<get_version_response>`.
#[derive(Debug, Default, Deserialize)]
struct VersionResponse {
    #[serde(rename = "@status", default)]
    status: Option<String>,
    #[serde(rename = "@status_text", default)]
    status_text: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// Task fields needed to build a status snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Task identifier.
    pub task_id: String,
    /// Task name.
    pub name: String,
    /// Raw remote status.
    pub status: String,
    /// Raw progress text.
    pub progress: String,
    /// Target identifier.
    pub target_id: String,
    /// Most recent report, preferring the last finished one.
    pub report_id: Option<String>,
}

/// Returns the cleaned response text (everything from the first `<`).
pub fn clean_text(raw: &[u8]) -> Result<String, ParseError> {
    strip_preamble(raw)
        .map(|xml| String::from_utf8_lossy(xml).into_owned())
        .ok_or(ParseError::MissingEnvelope)
}

fn decode<T: DeserializeOwned>(xml: &str) -> Result<T, ParseError> {
    quick_xml::de::from_str(xml).map_err(ParseError::malformed)
}

/// Fails with `Rejected` when `status` is present and outside 2xx.
pub fn ensure_accepted(status: Option<&str>, status_text: Option<&str>) -> Result<(), GmpError> {
    let Some(code) = status.and_then(|s| s.trim().parse::<u16>().ok()) else {
        return Ok(());
    };
    if (200..300).contains(&code) {
        Ok(())
    } else {
        Err(GmpError::Rejected {
            status: code,
            status_text: status_text.unwrap_or_default().to_string(),
        })
    }
}

/// Extracts the `id` attribute of the root `<create_*_response>` element.
pub fn extract_id(raw: &[u8]) -> Result<String, GmpError> {
    let xml = clean_text(raw)?;
    let root: ResponseRoot = decode(&xml)?;
    ensure_accepted(root.status.as_deref(), root.status_text.as_deref())?;

    match root.id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(GmpError::MissingField { field: "id", output: xml }),
    }
}

/// Checks the status of a response that carries no payload.
pub fn expect_ok(raw: &[u8]) -> Result<(), GmpError> {
    let xml = clean_text(raw)?;
    let root: ResponseRoot = decode(&xml)?;
    ensure_accepted(root.status.as_deref(), root.status_text.as_deref())
}

/// Decodes a `<get_tasks_response>` for one task.
pub fn parse_task(raw: &[u8]) -> Result<TaskSnapshot, GmpError> {
    let xml = clean_text(raw)?;
    let response: TasksResponse = decode(&xml)?;
    ensure_accepted(response.status.as_deref(), response.status_text.as_deref())?;

    let Some(task) = response.task.into_iter().next() else {
        return Err(GmpError::MissingField { field: "task", output: xml });
    };

    let report_id = [task.last_report, task.current_report]
        .into_iter()
        .flatten()
        .filter_map(|link| link.report.and_then(|r| r.id))
        .find(|id| !id.is_empty());

    Ok(TaskSnapshot {
        task_id: task.id,
        name: task.name.unwrap_or_default(),
        status: task.status.unwrap_or_default(),
        progress: task
            .progress
            .and_then(|p| p.value)
            .unwrap_or_default(),
        target_id: task.target.and_then(|t| t.id).unwrap_or_default(),
        report_id,
    })
}

/// Decodes a `<get_version_response>`.
pub fn parse_version(raw: &[u8]) -> Result<String, GmpError> {
    let xml = clean_text(raw)?;
    let response: VersionResponse = decode(&xml)?;
    ensure_accepted(response.status.as_deref(), response.status_text.as_deref())?;

    match response.version {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(GmpError::MissingField { field: "version", output: xml }),
    }
}
