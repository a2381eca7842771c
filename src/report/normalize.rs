//! Normalization of `<get_reports_response>` into a [`Report`].

use crate::core::ParseError;
use crate::report::model::{ErrorEntry, Nvt, PortEntry, Report, ReportMetadata, Summary, Vulnerability};
use crate::report::raw;
use crate::transport::strip_preamble;

use std::collections::{BTreeMap, BTreeSet};

/// Placeholders older managers emit for empty reference lists.
const EMPTY_REF_MARKERS: [&str; 3] = ["NOCVE", "NOBID", "NOXREF"];

/// A decoded report together with the response status attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEnvelope {
    /// GMP `status` attribute.
    pub status: Option<String>,
    /// GMP status text.
    pub status_text: Option<String>,
    /// The normalized report.
    pub report: Report,
}

/// Parses a raw `<get_reports_response>` into a normalized report.
///
/// Any preamble before the first `<` is ignored. Missing optional elements
/// yield empty lists and zero counts; only undecodable XML is an error.
///
/// # Errors
///
/// - `MissingEnvelope` if the input contains no `<`.
/// - `Malformed` if the XML cannot be decoded.
///
/// # Examples
///
/// ```rust
/// use scanrelay::report::parse;
///
/// let report = parse(b"<get_reports_response status=\"200\"/>").unwrap();
/// assert!(report.is_empty());
/// ```
pub fn parse(raw: &[u8]) -> Result<Report, ParseError> {
    parse_envelope(raw).map(|envelope| envelope.report)
}

/// Like [`parse`], but also returns the response status attributes.
pub fn parse_envelope(raw: &[u8]) -> Result<ReportEnvelope, ParseError> {
    let xml = strip_preamble(raw).ok_or(ParseError::MissingEnvelope)?;
    let xml = std::str::from_utf8(xml).map_err(ParseError::malformed)?;
    let response: raw::GetReportsResponse =
        quick_xml::de::from_str(xml).map_err(ParseError::malformed)?;

    Ok(ReportEnvelope {
        status: response.status,
        status_text: response.status_text,
        report: normalize(response.report.unwrap_or_default()),
    })
}

fn normalize(outer: raw::OuterReport) -> Report {
    let inner = outer.report.unwrap_or_default();

    let report_id = non_empty(outer.id)
        .or_else(|| non_empty(inner.id.clone()))
        .unwrap_or_default();

    let gmp_version = inner
        .gmp
        .as_ref()
        .and_then(|g| g.version.clone())
        .or_else(|| outer.gmp.as_ref().and_then(|g| g.version.clone()));

    let task = inner.task.or(outer.task).unwrap_or_default();
    let target = task.target.unwrap_or_default();

    let metadata = ReportMetadata {
        task_id: text(task.id),
        task_name: text(task.name),
        target_id: text(target.id),
        target_name: text(target.name),
        scan_start: text(inner.scan_start),
        scan_end: text(inner.scan_end),
        timezone: text(inner.timezone),
        gmp_version: text(gmp_version),
    };

    let raw_ports = inner.ports.unwrap_or_default();
    let ports: Vec<PortEntry> = raw_ports.items.into_iter().map(port_entry).collect();

    let vulnerabilities: Vec<Vulnerability> = inner
        .results
        .unwrap_or_default()
        .items
        .into_iter()
        .map(vulnerability)
        .collect();

    let raw_errors = inner.errors.unwrap_or_default();
    let errors: Vec<ErrorEntry> = raw_errors.items.into_iter().map(error_entry).collect();

    let mut summary = Summary {
        total_ports: count(raw_ports.count.as_deref()).unwrap_or(ports.len() as u64),
        total_vulns: vulnerabilities.len() as u64,
        total_errors: count(raw_errors.count.as_deref()).unwrap_or(errors.len() as u64),
        ..Summary::default()
    };

    summary.total_hosts = inner
        .hosts
        .and_then(|h| count(h.count.as_deref()))
        .unwrap_or_else(|| distinct_hosts(&inner.host_details, &vulnerabilities, &ports));

    apply_result_counts(&mut summary, inner.result_count.unwrap_or_default());
    if summary.severity_counts_are_zero() {
        count_by_threat_label(&mut summary, &vulnerabilities);
    }

    if !vulnerabilities.is_empty() {
        let scores = vulnerabilities.iter().map(|v| summary_score(v.severity_score));
        summary.max_severity = scores.clone().fold(0.0, f64::max);
        summary.avg_severity = scores.sum::<f64>() / vulnerabilities.len() as f64;
    }

    Report {
        report_id,
        scan_run_status: text(inner.scan_run_status),
        metadata,
        summary,
        ports,
        vulnerabilities,
        errors,
    }
}

/// Score a result contributes to the summary statistics.
///
/// GMP marks false positives (-1) and errors (-3) with negative severities.
/// They count as 0 in both the maximum and the average; the result itself
/// keeps its raw score.
fn summary_score(severity: f64) -> f64 {
    severity.max(0.0)
}

impl Summary {
    fn severity_counts_are_zero(&self) -> bool {
        [self.high, self.medium, self.low, self.log, self.warning, self.info]
            .iter()
            .all(|&c| c == 0)
    }
}

fn apply_result_counts(summary: &mut Summary, counts: raw::ResultCount) {
    let full = |pair: Option<raw::CountPair>| -> u64 {
        pair.and_then(|p| count(p.full.as_deref())).unwrap_or(0)
    };

    summary.high = full(counts.critical) + full(counts.high) + full(counts.hole);
    summary.medium = full(counts.medium);
    summary.low = full(counts.low);
    summary.log = full(counts.log);
    summary.warning = full(counts.warning);
    summary.info = full(counts.info);
    summary.false_positives = full(counts.false_positive);
}

fn count_by_threat_label(summary: &mut Summary, vulnerabilities: &[Vulnerability]) {
    let count_false_positives = summary.false_positives == 0;
    for vuln in vulnerabilities {
        match vuln.threat_label.to_ascii_lowercase().as_str() {
            "critical" | "high" | "alarm" => summary.high += 1,
            "medium" => summary.medium += 1,
            "low" => summary.low += 1,
            "log" => summary.log += 1,
            "false positive" | "debug" if count_false_positives => summary.false_positives += 1,
            _ => {}
        }
    }
}

fn distinct_hosts(details: &[raw::HostDetail], vulns: &[Vulnerability], ports: &[PortEntry]) -> u64 {
    let mut hosts: BTreeSet<&str> = details
        .iter()
        .filter_map(|d| d.ip.as_deref())
        .map(str::trim)
        .collect();
    hosts.extend(vulns.iter().map(|v| v.host.as_str()));
    hosts.extend(ports.iter().map(|p| p.host.as_str()));
    hosts.remove("");
    hosts.len() as u64
}

fn port_entry(port: raw::Port) -> PortEntry {
    let port_text = text(port.text);
    let protocol = port_text
        .split_once('/')
        .map(|(_, proto)| proto.trim().to_string())
        .unwrap_or_default();

    PortEntry {
        host: text(port.host),
        port: port_text,
        protocol,
        threat: text(port.threat),
    }
}

fn vulnerability(result: raw::ResultItem) -> Vulnerability {
    let host = result.host.unwrap_or_default();
    let severity_score = result
        .severity
        .as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite())
        .unwrap_or(0.0);

    Vulnerability {
        id: text(result.id),
        name: text(result.name),
        host: text(host.address),
        hostname: text(host.hostname),
        port: text(result.port),
        severity_score,
        threat_label: text(result.threat),
        qod: result
            .qod
            .and_then(|q| q.value)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0),
        description: text(result.description),
        nvt: result.nvt.map(nvt).unwrap_or_default(),
        creation_time: text(result.creation_time),
        modification_time: text(result.modification_time),
    }
}

fn nvt(raw: raw::Nvt) -> Nvt {
    let tags = parse_tags(raw.tags.as_deref().unwrap_or_default());

    let mut cve_refs = split_legacy_list(raw.cve.as_deref());
    let mut bid_refs = split_legacy_list(raw.bid.as_deref());
    let mut cert_refs = Vec::new();
    let mut xrefs = split_legacy_list(raw.xref.as_deref());

    for reference in raw.refs.map(|r| r.items).unwrap_or_default() {
        let Some(id) = non_empty(reference.id) else {
            continue;
        };
        let kind = reference.kind.unwrap_or_default().to_ascii_lowercase();
        match kind.as_str() {
            "cve" | "cve_id" => cve_refs.push(id),
            "bid" => bid_refs.push(id),
            k if k.contains("cert") => cert_refs.push(id),
            _ => xrefs.push(id),
        }
    }
    cert_refs.extend(
        raw.cert
            .map(|c| c.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| non_empty(r.id)),
    );
    xrefs.extend(
        raw.xrefs
            .map(|x| x.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| non_empty(r.id)),
    );

    let solution = raw
        .solution
        .and_then(|s| non_empty(s.text))
        .or_else(|| tags.get("solution").cloned())
        .unwrap_or_default();

    Nvt {
        oid: text(raw.oid),
        name: text(raw.name),
        family: text(raw.family),
        cvss_base: text(raw.cvss_base),
        tags,
        solution,
        cve_refs,
        bid_refs,
        cert_refs,
        xrefs,
    }
}

fn error_entry(error: raw::ErrorItem) -> ErrorEntry {
    let nvt = error.nvt.unwrap_or_default();
    ErrorEntry {
        host: text(error.host.and_then(|h| h.address)),
        port: text(error.port),
        description: text(error.description),
        nvt_oid: text(nvt.oid),
        nvt_name: text(nvt.name),
    }
}

/// Splits `key=value|key=value` into a map.
///
/// Each pair splits on its first `=`; pairs without one are skipped.
pub fn parse_tags(tags: &str) -> BTreeMap<String, String> {
    tags.split('|')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn split_legacy_list(list: Option<&str>) -> Vec<String> {
    list.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty() && !EMPTY_REF_MARKERS.contains(item))
        .map(str::to_string)
        .collect()
}

fn count(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(|n| n.max(0) as u64)
}

fn text(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
