//! nmap driver.

use crate::core::{CommandRunner, Deadline, PortScanError, PortScanResult, TransportError};
use crate::portscan::model::{CombinedScan, NmapRun};
use crate::portscan::raw;
use crate::transport::ProcessRunner;

use serde::Deserialize;

/// UDP ports probed by [`PortScanner::run_parallel_scan`].
///
/// DNS, DHCP, TFTP, NTP, SNMP, IKE, SSDP and IPsec NAT-T.
pub const UDP_SERVICE_PORTS: &str = "53,67,68,69,123,161,500,1900,4500";

/// nmap scan type for the TCP version-detection scan.
pub const TCP_VERSION_SCAN: &str = "-sV";

/// nmap scan type for the UDP scan.
pub const UDP_SCAN: &str = "-sU";

/// Configuration for the nmap driver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NmapConfig {
    /// Program to invoke.
    pub program: String,

    /// Timing template passed to every scan.
    pub timing: String,

    /// Ports probed by the UDP scan.
    pub udp_ports: String,
}

impl Default for NmapConfig {
    fn default() -> Self {
        Self {
            program: "nmap".to_string(),
            timing: "-T4".to_string(),
            udp_ports: UDP_SERVICE_PORTS.to_string(),
        }
    }
}

impl NmapConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the program to invoke.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets the timing template (e.g. `-T3`).
    pub fn with_timing(mut self, timing: impl Into<String>) -> Self {
        self.timing = timing.into();
        self
    }

    /// Sets the UDP port list.
    pub fn with_udp_ports(mut self, ports: impl Into<String>) -> Self {
        self.udp_ports = ports.into();
        self
    }
}

/// Runs nmap and decodes its XML output.
///
/// # Example
///
/// ```rust,ignore
/// use scanrelay::core::Deadline;
/// use scanrelay::portscan::{NmapConfig, PortScanner};
///
/// let scanner = PortScanner::new(NmapConfig::default());
/// let combined = scanner.run_parallel_scan("10.0.0.5", &Deadline::none()).await?;
/// println!("{} open TCP ports", combined.tcp.open_ports().count());
/// ```
#[derive(Debug)]
pub struct PortScanner<R = ProcessRunner> {
    config: NmapConfig,
    runner: R,
}

impl PortScanner<ProcessRunner> {
    /// Creates a scanner that launches real processes.
    pub fn new(config: NmapConfig) -> Self {
        Self::with_runner(config, ProcessRunner::new())
    }
}

impl<R: CommandRunner> PortScanner<R> {
    /// Creates a scanner on top of a custom runner.
    pub fn with_runner(config: NmapConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &NmapConfig {
        &self.config
    }

    /// Returns the underlying runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Builds `<scan_type> -n <timing> -oX - <extra_args...> -- <target>`.
    pub fn build_args(&self, target: &str, scan_type: &str, extra_args: &[&str]) -> Vec<String> {
        let mut args = vec![
            scan_type.to_string(),
            "-n".to_string(),
            self.config.timing.clone(),
            "-oX".to_string(),
            "-".to_string(),
        ];
        args.extend(extra_args.iter().map(|arg| arg.to_string()));
        args.push("--".to_string());
        args.push(target.to_string());
        args
    }

    /// Runs one scan of `target`.
    ///
    /// # Errors
    ///
    /// `EmptyTarget` or `InvalidTarget` if `target` is blank or starts with
    /// `-`; nmap is not launched. `Execution` if nmap cannot be launched or
    /// exits unsuccessfully, `Decode` if its output is not valid nmap XML.
    pub async fn scan(
        &self,
        target: &str,
        scan_type: &str,
        extra_args: &[&str],
        deadline: &Deadline,
    ) -> PortScanResult<NmapRun> {
        let target = target.trim();
        if target.is_empty() {
            return Err(PortScanError::EmptyTarget);
        }
        if target.starts_with('-') {
            return Err(PortScanError::InvalidTarget {
                target: target.to_string(),
            });
        }

        let label = scan_label(scan_type);
        let args = self.build_args(target, scan_type, extra_args);
        tracing::debug!(program = %self.config.program, ?args, "Running port scan");

        let output = self
            .runner
            .run(&self.config.program, &args, deadline)
            .await
            .map_err(|source| PortScanError::Execution { scan: label, source })?;

        if !output.success {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(
                scan = label,
                exit_code = ?output.exit_code,
                stderr = %stderr,
                "Port scan failed"
            );
            return Err(PortScanError::Execution {
                scan: label,
                source: TransportError::CommandFailed {
                    program: self.config.program.clone(),
                    exit_code: output.exit_code,
                    output: if stderr.is_empty() {
                        output.combined()
                    } else {
                        stderr
                    },
                },
            });
        }

        raw::decode(&output.stdout).map_err(|source| PortScanError::Decode { scan: label, source })
    }

    /// Runs the TCP version-detection scan and the UDP service scan of
    /// `target` concurrently.
    ///
    /// Both scans always run to completion or to the first failure; if
    /// either fails the whole operation fails.
    pub async fn run_parallel_scan(
        &self,
        target: &str,
        deadline: &Deadline,
    ) -> PortScanResult<CombinedScan> {
        let udp_args = ["-p", self.config.udp_ports.as_str()];

        let (tcp, udp) = futures::try_join!(
            self.scan(target, TCP_VERSION_SCAN, &[], deadline),
            self.scan(target, UDP_SCAN, &udp_args, deadline),
        )?;

        tracing::info!(
            target_host = %target,
            tcp_open = tcp.open_ports().count(),
            udp_open = udp.open_ports().count(),
            "Parallel port scan finished"
        );

        Ok(CombinedScan { tcp, udp })
    }
}

fn scan_label(scan_type: &str) -> &'static str {
    if scan_type == UDP_SCAN {
        "udp"
    } else {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CommandOutput, ErrorKind};
    use crate::portscan::raw::tests::{TCP_RUN, UDP_RUN};
    use crate::transport::MockRunner;

    fn scanner(runner: MockRunner) -> PortScanner<MockRunner> {
        PortScanner::with_runner(NmapConfig::default(), runner)
    }

    #[test]
    fn test_build_args() {
        let scanner = scanner(MockRunner::new());
        assert_eq!(
            scanner.build_args("10.0.0.5", "-sU", &["-p", "53"]),
            vec!["-sU", "-n", "-T4", "-oX", "-", "-p", "53", "--", "10.0.0.5"]
        );
    }

    #[tokio::test]
    async fn test_option_like_target_is_rejected() {
        let scanner = scanner(MockRunner::new());

        for target in ["--script=/tmp/evil.nse", "-iL/etc/shadow", " -oN/tmp/out"] {
            let err = scanner
                .scan(target, TCP_VERSION_SCAN, &[], &Deadline::none())
                .await
                .unwrap_err();
            assert!(matches!(err, PortScanError::InvalidTarget { .. }));
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        let err = scanner
            .run_parallel_scan("-iL/etc/shadow", &Deadline::none())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(scanner.runner().call_count(), 0);
    }

    #[tokio::test]
    async fn test_parallel_scan_combines_both_runs() {
        let runner = MockRunner::new()
            .with_output(CommandOutput::success(TCP_RUN))
            .with_output(CommandOutput::success(UDP_RUN));
        let scanner = scanner(runner);

        let combined = scanner
            .run_parallel_scan("10.0.0.5", &Deadline::none())
            .await
            .unwrap();
        assert_eq!(combined.tcp.ports().count(), 2);
        assert_eq!(combined.udp.ports().count(), 2);
        assert_eq!(combined.udp.hosts[0].ports[0].protocol, "udp");

        let calls = scanner.runner().calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(program, _)| program == "nmap"));
        assert_eq!(calls[0].1[0], "-sV");
        assert_eq!(calls[1].1[0], "-sU");
        assert!(calls[1].1.contains(&UDP_SERVICE_PORTS.to_string()));
    }

    #[tokio::test]
    async fn test_parallel_scan_fails_if_either_branch_fails() {
        let runner = MockRunner::new()
            .with_output(CommandOutput::success(TCP_RUN))
            .with_output(CommandOutput::failure(1, "You requested a scan type which requires root privileges."));
        let scanner = scanner(runner);

        let err = scanner
            .run_parallel_scan("10.0.0.5", &Deadline::none())
            .await
            .unwrap_err();
        assert_eq!(err.scan(), Some("udp"));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("root privileges"));
    }

    #[tokio::test]
    async fn test_undecodable_output() {
        let scanner = scanner(MockRunner::new().with_default(CommandOutput::success("garbage")));
        let err = scanner
            .scan("10.0.0.5", TCP_VERSION_SCAN, &[], &Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, PortScanError::Decode { scan: "tcp", .. }));
    }

    #[tokio::test]
    async fn test_empty_target_is_rejected() {
        let scanner = scanner(MockRunner::new());
        let err = scanner.run_parallel_scan("  ", &Deadline::none()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(scanner.runner().call_count(), 0);
    }
}
