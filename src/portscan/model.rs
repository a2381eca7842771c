//! Port scan results.

use serde::{Deserialize, Serialize};

/// One nmap run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NmapRun {
    /// Command line nmap reported for the run.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub args: String,
    /// nmap version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Scanned hosts.
    pub hosts: Vec<NmapHost>,
}

impl NmapRun {
    /// Iterates over every port of every host.
    pub fn ports(&self) -> impl Iterator<Item = &NmapPort> {
        self.hosts.iter().flat_map(|host| host.ports.iter())
    }

    /// Iterates over ports nmap reported as `open`.
    pub fn open_ports(&self) -> impl Iterator<Item = &NmapPort> {
        self.ports().filter(|port| port.is_open())
    }
}

/// A scanned host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NmapHost {
    /// Host addresses (IP and, on local networks, MAC).
    pub addresses: Vec<String>,
    /// Resolved host names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,
    /// Host state (`up`, `down`), when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Probed ports.
    pub ports: Vec<NmapPort>,
}

/// A probed port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NmapPort {
    /// Port number.
    pub port: u16,
    /// `tcp` or `udp`.
    pub protocol: String,
    /// `open`, `closed`, `filtered`, `open|filtered`, ...
    pub state: String,
    /// Detected service name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Detected product, with version detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    /// Detected product version, with version detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl NmapPort {
    /// Returns `true` for ports in state `open`.
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

/// Results of the concurrent TCP and UDP scans of one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedScan {
    /// Version-detection TCP scan.
    pub tcp: NmapRun,
    /// UDP scan of the well-known service ports.
    pub udp: NmapRun,
}
