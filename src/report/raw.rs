//! Wire shapes of `<get_reports_response>`.
//!
//! Only the parts the normalizer reads are modelled. Every field is optional
//! or defaulted; numbers are kept as text and parsed leniently later.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GetReportsResponse {
    #[serde(rename = "@status", default)]
    pub status: Option<String>,
    #[serde(rename = "@status_text", default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub report: Option<OuterReport>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OuterReport {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub gmp: Option<Gmp>,
    #[serde(default)]
    pub task: Option<Task>,
    #[serde(default)]
    pub report: Option<InnerReport>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Gmp {
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InnerReport {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub gmp: Option<Gmp>,
    #[serde(default)]
    pub scan_run_status: Option<String>,
    #[serde(default)]
    pub hosts: Option<Counted>,
    #[serde(default)]
    pub vulns: Option<Counted>,
    #[serde(default)]
    pub task: Option<Task>,
    #[serde(default)]
    pub scan_start: Option<String>,
    #[serde(default)]
    pub scan_end: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub ports: Option<Ports>,
    #[serde(default)]
    pub results: Option<Results>,
    #[serde(default)]
    pub result_count: Option<ResultCount>,
    #[serde(default)]
    pub errors: Option<Errors>,
    #[serde(rename = "host", default)]
    pub host_details: Vec<HostDetail>,
}

/// `<x><count>N</count></x>`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Counted {
    #[serde(default)]
    pub count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Task {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target: Option<Target>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Target {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Ports {
    #[serde(default)]
    pub count: Option<String>,
    #[serde(rename = "port", default)]
    pub items: Vec<Port>,
}

/// `<port>443/tcp<host>..</host><threat>..</threat></port>`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Port {
    #[serde(rename = "$text", default)]
    pub text: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub threat: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Results {
    #[serde(rename = "result", default)]
    pub items: Vec<ResultItem>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResultItem {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host: Option<ResultHost>,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub nvt: Option<Nvt>,
    #[serde(default)]
    pub threat: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub qod: Option<Qod>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub modification_time: Option<String>,
}

/// `<host>10.0.0.1<asset asset_id=".."/><hostname>..</hostname></host>`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResultHost {
    #[serde(rename = "$text", default)]
    pub address: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Qod {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Nvt {
    #[serde(rename = "@oid", default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub cvss_base: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub solution: Option<Solution>,
    #[serde(default)]
    pub refs: Option<Refs>,
    /// Legacy comma-separated CVE list.
    #[serde(default)]
    pub cve: Option<String>,
    /// Legacy comma-separated Bugtraq list.
    #[serde(default)]
    pub bid: Option<String>,
    /// Legacy comma-separated reference list.
    #[serde(default)]
    pub xref: Option<String>,
    #[serde(default)]
    pub xrefs: Option<LegacyXrefs>,
    #[serde(default)]
    pub cert: Option<LegacyCert>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Solution {
    #[serde(rename = "$text", default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Refs {
    #[serde(rename = "ref", default)]
    pub items: Vec<Ref>,
}

/// `<ref type="cve" id="CVE-2021-0001"/>`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Ref {
    #[serde(rename = "@type", default)]
    pub kind: Option<String>,
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LegacyXrefs {
    #[serde(rename = "xref", default)]
    pub items: Vec<Ref>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LegacyCert {
    #[serde(rename = "cert_ref", default)]
    pub items: Vec<Ref>,
}

/// Per-severity count pair.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CountPair {
    #[serde(default)]
    pub full: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResultCount {
    #[serde(default)]
    pub critical: Option<CountPair>,
    #[serde(default)]
    pub high: Option<CountPair>,
    #[serde(default)]
    pub medium: Option<CountPair>,
    #[serde(default)]
    pub low: Option<CountPair>,
    #[serde(default)]
    pub log: Option<CountPair>,
    /// Legacy name for high.
    #[serde(default)]
    pub hole: Option<CountPair>,
    #[serde(default)]
    pub warning: Option<CountPair>,
    #[serde(default)]
    pub info: Option<CountPair>,
    #[serde(default)]
    pub false_positive: Option<CountPair>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Errors {
    #[serde(default)]
    pub count: Option<String>,
    #[serde(rename = "error", default)]
    pub items: Vec<ErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorItem {
    #[serde(default)]
    pub host: Option<ResultHost>,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nvt: Option<ErrorNvt>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorNvt {
    #[serde(rename = "@oid", default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Per-host detail block of the inner report.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct HostDetail {
    #[serde(default)]
    pub ip: Option<String>,
}
