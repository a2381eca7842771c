//! nmap `-oX` schema, limited to what the results use.

use crate::core::ParseError;
use crate::portscan::model::{NmapHost, NmapPort, NmapRun};
use crate::transport::strip_preamble;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct RawRun {
    #[serde(rename = "@args", default)]
    args: String,
    #[serde(rename = "@version", default)]
    version: String,
    #[serde(rename = "host", default)]
    hosts: Vec<RawHost>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHost {
    #[serde(default)]
    status: Option<RawState>,
    #[serde(rename = "address", default)]
    addresses: Vec<RawAddress>,
    #[serde(default)]
    hostnames: Option<RawHostnames>,
    #[serde(default)]
    ports: Option<RawPorts>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAddress {
    #[serde(rename = "@addr", default)]
    addr: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawHostnames {
    #[serde(rename = "hostname", default)]
    hostnames: Vec<RawHostname>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHostname {
    #[serde(rename = "@name", default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawPorts {
    #[serde(rename = "port", default)]
    ports: Vec<RawPort>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPort {
    #[serde(rename = "@portid")]
    portid: u16,
    #[serde(rename = "@protocol", default)]
    protocol: String,
    #[serde(default)]
    state: Option<RawState>,
    #[serde(default)]
    service: Option<RawService>,
}

#[derive(Debug, Default, Deserialize)]
struct RawState {
    #[serde(rename = "@state", default)]
    state: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawService {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@product", default)]
    product: Option<String>,
    #[serde(rename = "@version", default)]
    version: Option<String>,
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Decodes `nmap -oX -` output.
pub(crate) fn decode(output: &[u8]) -> Result<NmapRun, ParseError> {
    let xml = strip_preamble(output).ok_or(ParseError::MissingEnvelope)?;
    let text = String::from_utf8_lossy(xml);
    let raw: RawRun = quick_xml::de::from_str(&text).map_err(ParseError::malformed)?;

    let hosts = raw
        .hosts
        .into_iter()
        .map(|host| NmapHost {
            addresses: host
                .addresses
                .into_iter()
                .map(|a| a.addr)
                .filter(|a| !a.is_empty())
                .collect(),
            hostnames: host
                .hostnames
                .map(|h| h.hostnames.into_iter().map(|n| n.name).collect())
                .unwrap_or_default(),
            state: host.status.and_then(|s| non_empty(s.state)),
            ports: host
                .ports
                .map(|p| p.ports)
                .unwrap_or_default()
                .into_iter()
                .map(|port| {
                    let service = port.service.unwrap_or_default();
                    NmapPort {
                        port: port.portid,
                        protocol: port.protocol,
                        state: port.state.map(|s| s.state).unwrap_or_default(),
                        service: non_empty(service.name),
                        product: service.product.and_then(non_empty),
                        version: service.version.and_then(non_empty),
                    }
                })
                .collect(),
        })
        .collect();

    Ok(NmapRun {
        args: raw.args,
        version: raw.version,
        hosts,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TCP_RUN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<?xml-stylesheet href="file:///usr/bin/../share/nmap/nmap.xsl" type="text/xsl"?>
<nmaprun scanner="nmap" args="nmap -sV -n -T4 -oX - 10.0.0.5" start="1700000000" version="7.94" xmloutputversion="1.05">
<scaninfo type="connect" protocol="tcp" numservices="1000" services="1-1000"/>
<verbose level="0"/>
<host starttime="1700000000" endtime="1700000010">
<status state="up" reason="conn-refused" reason_ttl="0"/>
<address addr="10.0.0.5" addrtype="ipv4"/>
<hostnames>
<hostname name="db.internal" type="PTR"/>
</hostnames>
<ports><extraports state="closed" count="998"/>
<port protocol="tcp" portid="22"><state state="open" reason="syn-ack" reason_ttl="0"/><service name="ssh" product="OpenSSH" version="9.6" method="probed" conf="10"/></port>
<port protocol="tcp" portid="5432"><state state="filtered" reason="no-response" reason_ttl="0"/><service name="postgresql" method="table" conf="3"/></port>
</ports>
<times srtt="120" rttvar="80" to="100000"/>
</host>
<runstats><finished time="1700000010" elapsed="10.00" exit="success"/><hosts up="1" down="0" total="1"/></runstats>
</nmaprun>
"#;

    pub(crate) const UDP_RUN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nmaprun scanner="nmap" args="nmap -sU -n -T4 -oX - -p 53,123 10.0.0.5" version="7.94">
<host><status state="up"/><address addr="10.0.0.5" addrtype="ipv4"/>
<ports>
<port protocol="udp" portid="53"><state state="open"/><service name="domain"/></port>
<port protocol="udp" portid="123"><state state="open|filtered"/><service name="ntp"/></port>
</ports>
</host>
</nmaprun>
"#;

    #[test]
    fn test_decode_version_scan() {
        let run = decode(TCP_RUN.as_bytes()).unwrap();
        assert_eq!(run.version, "7.94");
        assert_eq!(run.hosts.len(), 1);

        let host = &run.hosts[0];
        assert_eq!(host.addresses, vec!["10.0.0.5"]);
        assert_eq!(host.hostnames, vec!["db.internal"]);
        assert_eq!(host.state.as_deref(), Some("up"));
        assert_eq!(host.ports.len(), 2);

        let ssh = &host.ports[0];
        assert_eq!(ssh.port, 22);
        assert_eq!(ssh.protocol, "tcp");
        assert!(ssh.is_open());
        assert_eq!(ssh.service.as_deref(), Some("ssh"));
        assert_eq!(ssh.product.as_deref(), Some("OpenSSH"));
        assert_eq!(ssh.version.as_deref(), Some("9.6"));

        assert_eq!(run.open_ports().count(), 1);
    }

    #[test]
    fn test_decode_without_hosts() {
        let run = decode(br#"<nmaprun scanner="nmap"><runstats/></nmaprun>"#).unwrap();
        assert!(run.hosts.is_empty());
    }

    #[test]
    fn test_decode_failures() {
        assert_eq!(decode(b"").unwrap_err(), ParseError::MissingEnvelope);
        assert!(matches!(
            decode(b"<nmaprun><host><ports><port portid=\"x\"/></ports></host></nmaprun>"),
            Err(ParseError::Malformed { .. })
        ));
    }
}
