//! Device fingerprint collection for account registration and activation.
//!
//! Reads the primary MAC address, hostname, OS, and CPU model from the host.
//! Nothing here fails: missing data falls back to the zero MAC sentinel or
//! omitted optional fields. Values are collected fresh on every call.

use serde::{Deserialize, Serialize};
use std::process::Command;

/// MAC address reported when no qualifying interface exists.
pub const UNKNOWN_MAC: &str = "00:00:00:00:00:00";

/// Snapshot of host identifiers sent to the pex.bot backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Colon-hex MAC of the first non-internal interface.
    pub mac_address: String,
    pub hostname: String,
    /// OS type and kernel release, e.g. "Linux 6.8.0".
    pub os: String,
    /// CPU model string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// CPU model with logical core count, e.g. "AMD Ryzen 9 (16 cores)".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_info: Option<String>,
}

/// A network interface as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInterface {
    pub name: String,
    pub mac: Option<String>,
    /// Loopback or otherwise host-internal.
    pub internal: bool,
}

impl Fingerprint {
    /// Collect a fingerprint from the current host.
    pub fn collect() -> Self {
        let interfaces = list_interfaces();
        let cpu_model = get_cpu_model();
        let cores = num_cpus();

        Self {
            mac_address: select_mac(&interfaces),
            hostname: get_hostname(),
            os: format!("{} {}", os_type(), os_release()),
            cpu_info: cpu_model
                .as_ref()
                .map(|model| format!("{model} ({cores} cores)")),
            model_name: cpu_model,
        }
    }
}

/// Pick the MAC of the first interface that is not internal and not all-zero.
///
/// Enumeration order is preserved as given; no sorting.
pub fn select_mac(interfaces: &[NetInterface]) -> String {
    interfaces
        .iter()
        .filter(|iface| !iface.internal)
        .filter_map(|iface| iface.mac.as_deref())
        .find(|mac| !mac.is_empty() && *mac != UNKNOWN_MAC)
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_MAC.to_string())
}

/// Enumerate interfaces: `ip -o link` on Linux, `ifconfig -a` elsewhere.
fn list_interfaces() -> Vec<NetInterface> {
    if let Ok(output) = Command::new("ip").args(["-o", "link"]).output() {
        let ifaces = parse_ip_link(&String::from_utf8_lossy(&output.stdout));
        if !ifaces.is_empty() {
            return ifaces;
        }
    }
    if let Ok(output) = Command::new("ifconfig").arg("-a").output() {
        return parse_ifconfig(&String::from_utf8_lossy(&output.stdout));
    }
    Vec::new()
}

/// Parse `ip -o link` output, one interface per line.
///
/// ```text
/// 1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 ... link/loopback 00:00:00:00:00:00 brd ...
/// 2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 ... link/ether 52:54:00:12:34:56 brd ...
/// ```
pub fn parse_ip_link(output: &str) -> Vec<NetInterface> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, ':');
            let _index = fields.next()?;
            let name = fields.next()?.trim();
            let rest = fields.next().unwrap_or("");
            if name.is_empty() {
                return None;
            }
            // "eth0@if12" style veth names
            let name = name.split('@').next().unwrap_or(name).to_string();

            let internal = rest.contains("LOOPBACK") || rest.contains("link/loopback");
            let mac = rest
                .find("link/ether ")
                .and_then(|pos| mac_at(&rest[pos + "link/ether ".len()..]));

            Some(NetInterface { name, mac, internal })
        })
        .collect()
}

/// Parse `ifconfig -a` output (BSD/macOS and net-tools formats).
pub fn parse_ifconfig(output: &str) -> Vec<NetInterface> {
    let mut ifaces: Vec<NetInterface> = Vec::new();

    for line in output.lines() {
        if line.is_empty() {
            continue;
        }
        let starts_block = !line.starts_with(char::is_whitespace);
        if starts_block {
            let name = line
                .split(|c: char| c == ':' || c.is_whitespace())
                .next()
                .unwrap_or("")
                .to_string();
            if name.is_empty() {
                continue;
            }
            let internal = line.contains("LOOPBACK") || name.starts_with("lo");
            ifaces.push(NetInterface {
                name,
                mac: None,
                internal,
            });
        }

        let Some(current) = ifaces.last_mut() else {
            continue;
        };
        if current.mac.is_some() {
            continue;
        }
        let trimmed = line.trim();
        for marker in ["ether ", "HWaddr "] {
            if let Some(pos) = trimmed.find(marker) {
                current.mac = mac_at(&trimmed[pos + marker.len()..]);
                break;
            }
        }
    }

    ifaces
}

/// Read a 17-char colon-hex MAC at the start of `s`, lowercased.
fn mac_at(s: &str) -> Option<String> {
    let candidate = s.get(..17)?;
    let valid = candidate.split(':').count() == 6
        && candidate
            .split(':')
            .all(|octet| octet.len() == 2 && octet.chars().all(|c| c.is_ascii_hexdigit()));
    valid.then(|| candidate.to_lowercase())
}

/// Get the system hostname.
fn get_hostname() -> String {
    if let Ok(name) = std::fs::read_to_string("/etc/hostname") {
        let trimmed = name.trim().to_string();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }
    if let Ok(output) = Command::new("hostname").output() {
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !name.is_empty() {
            return name;
        }
    }
    "unknown".to_string()
}

/// OS type in the naming the backend expects.
fn os_type() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows_NT",
        "freebsd" => "FreeBSD",
        "openbsd" => "OpenBSD",
        other => other,
    }
}

/// Kernel release string.
fn os_release() -> String {
    if let Ok(release) = std::fs::read_to_string("/proc/sys/kernel/osrelease") {
        let trimmed = release.trim().to_string();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }
    if let Ok(output) = Command::new("uname").arg("-r").output() {
        let release = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !release.is_empty() {
            return release;
        }
    }
    "unknown".to_string()
}

/// CPU model string, if the host reports one.
fn get_cpu_model() -> Option<String> {
    if let Ok(cpuinfo) = std::fs::read_to_string("/proc/cpuinfo") {
        if let Some(model) = parse_cpuinfo_model(&cpuinfo) {
            return Some(model);
        }
    }

    // macOS
    if let Ok(output) = Command::new("sysctl")
        .args(["-n", "machdep.cpu.brand_string"])
        .output()
    {
        let model = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !model.is_empty() {
            return Some(model);
        }
    }

    None
}

/// Find the model line in `/proc/cpuinfo`.
///
/// ARM kernels report the SoC as "Hardware" and the board as "Model"; the board
/// is only used when nothing else names the processor.
fn parse_cpuinfo_model(cpuinfo: &str) -> Option<String> {
    for key in ["model name", "hardware", "cpu", "model"] {
        for line in cpuinfo.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case(key) {
                let value = value.trim();
                // x86 "model : 151" is a numeric id, not a name
                if !value.is_empty() && value.parse::<u64>().is_err() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Number of logical CPUs.
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
