//! The fixed catalog of diagnostic probes and the seams they run through.
//!
//! Every probe is either an external command (ping, traceroute, ...), the
//! public IP lookup, or the three-phase bandwidth measurement.

use std::fmt;

use serde::Serialize;

use crate::config::ProbesConfig;
use crate::settings::Settings;

pub mod command;
pub mod public_ip;
pub mod speedtest;

pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use public_ip::{HttpIpLookup, PublicIpLookup};
pub use speedtest::{BandwidthMeter, HttpBandwidthMeter, ServerInfo};

/// The closed set of probes, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProbeKind {
    Ping,
    Traceroute,
    IpConfiguration,
    CurrentPublicIp,
    DnsFlush,
    Nslookup,
    Netstat,
    Speedtest,
}

impl ProbeKind {
    /// All probes in declaration order.
    pub const ALL: [ProbeKind; 8] = [
        ProbeKind::Ping,
        ProbeKind::Traceroute,
        ProbeKind::IpConfiguration,
        ProbeKind::CurrentPublicIp,
        ProbeKind::DnsFlush,
        ProbeKind::Nslookup,
        ProbeKind::Netstat,
        ProbeKind::Speedtest,
    ];

    /// Key under `test_preferences` in the settings file.
    pub fn settings_key(self) -> &'static str {
        match self {
            ProbeKind::Ping => "Ping",
            ProbeKind::Traceroute => "Traceroute",
            ProbeKind::IpConfiguration => "IP Configuration",
            ProbeKind::CurrentPublicIp => "Current Public IP",
            ProbeKind::DnsFlush => "DNS Flush",
            ProbeKind::Nslookup => "Nslookup",
            ProbeKind::Netstat => "Netstat",
            ProbeKind::Speedtest => "Speedtest",
        }
    }

    /// Name the probe is reported under in a `ResultSet`.
    pub fn result_name(self) -> &'static str {
        match self {
            ProbeKind::Ping => "Ping Test",
            ProbeKind::Traceroute => "Traceroute Test",
            ProbeKind::IpConfiguration => "IP Configuration",
            ProbeKind::CurrentPublicIp => "Current Public IP",
            ProbeKind::DnsFlush => "DNS Flush",
            ProbeKind::Nslookup => "Nslookup Test",
            ProbeKind::Netstat => "Netstat",
            ProbeKind::Speedtest => "Speedtest",
        }
    }

    pub fn progress_label(self) -> &'static str {
        match self {
            ProbeKind::Ping => "Running Ping Test...",
            ProbeKind::Traceroute => "Running Traceroute Test...",
            ProbeKind::IpConfiguration => "Running IP Configuration Test...",
            ProbeKind::CurrentPublicIp => "Retrieving Current Public IP...",
            ProbeKind::DnsFlush => "Running DNS Flush...",
            ProbeKind::Nslookup => "Running Nslookup Test...",
            ProbeKind::Netstat => "Running Netstat...",
            ProbeKind::Speedtest => "Running Speedtest...",
        }
    }

    pub fn from_settings_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.settings_key() == key)
    }

    /// What running this probe means on the current platform.
    pub fn action(self, cfg: &ProbesConfig) -> ProbeAction {
        match self {
            ProbeKind::CurrentPublicIp => ProbeAction::PublicIp {
                url: cfg.public_ip_url.clone(),
            },
            ProbeKind::Speedtest => ProbeAction::Bandwidth,
            _ => ProbeAction::Command(platform_command(self, cfg)),
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.result_name())
    }
}

/// An external program invocation: executable plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ProbeCommand {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for ProbeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProbeAction {
    Command(ProbeCommand),
    PublicIp { url: String },
    Bandwidth,
}

/// One entry of the probe catalog, resolved against settings and config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeDefinition {
    pub kind: ProbeKind,
    pub action: ProbeAction,
    pub enabled: bool,
}

impl ProbeDefinition {
    pub fn new(kind: ProbeKind, action: ProbeAction, enabled: bool) -> Self {
        Self {
            kind,
            action,
            enabled,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.result_name()
    }
}

/// Resolve the full catalog, flagging each probe enabled or not.
pub fn catalog(settings: &Settings, cfg: &ProbesConfig) -> Vec<ProbeDefinition> {
    ProbeKind::ALL
        .into_iter()
        .map(|kind| ProbeDefinition::new(kind, kind.action(cfg), settings.is_enabled(kind)))
        .collect()
}

/// The enabled subset of the catalog, still in declaration order.
pub fn enabled_plan(settings: &Settings, cfg: &ProbesConfig) -> Vec<ProbeDefinition> {
    catalog(settings, cfg)
        .into_iter()
        .filter(|def| def.enabled)
        .collect()
}

#[cfg(windows)]
fn platform_command(kind: ProbeKind, cfg: &ProbesConfig) -> ProbeCommand {
    let target = cfg.ping_target.as_str();
    match kind {
        ProbeKind::Ping => ProbeCommand::new("ping", ["-n", "4", target]),
        ProbeKind::Traceroute => ProbeCommand::new("tracert", [target]),
        ProbeKind::IpConfiguration => ProbeCommand::new("ipconfig", ["/all"]),
        ProbeKind::DnsFlush => ProbeCommand::new("ipconfig", ["/flushdns"]),
        ProbeKind::Nslookup => ProbeCommand::new("nslookup", [cfg.lookup_host.as_str()]),
        _ => ProbeCommand::new("netstat", Vec::<String>::new()),
    }
}

#[cfg(target_os = "macos")]
fn platform_command(kind: ProbeKind, cfg: &ProbesConfig) -> ProbeCommand {
    let target = cfg.ping_target.as_str();
    match kind {
        ProbeKind::Ping => ProbeCommand::new("ping", ["-c", "4", target]),
        ProbeKind::Traceroute => ProbeCommand::new("traceroute", [target]),
        ProbeKind::IpConfiguration => ProbeCommand::new("ifconfig", ["-a"]),
        ProbeKind::DnsFlush => ProbeCommand::new("dscacheutil", ["-flushcache"]),
        ProbeKind::Nslookup => ProbeCommand::new("nslookup", [cfg.lookup_host.as_str()]),
        _ => ProbeCommand::new("netstat", Vec::<String>::new()),
    }
}

#[cfg(not(any(windows, target_os = "macos")))]
fn platform_command(kind: ProbeKind, cfg: &ProbesConfig) -> ProbeCommand {
    let target = cfg.ping_target.as_str();
    match kind {
        ProbeKind::Ping => ProbeCommand::new("ping", ["-c", "4", target]),
        ProbeKind::Traceroute => ProbeCommand::new("traceroute", [target]),
        ProbeKind::IpConfiguration => ProbeCommand::new("ip", ["addr", "show"]),
        ProbeKind::DnsFlush => ProbeCommand::new("resolvectl", ["flush-caches"]),
        ProbeKind::Nslookup => ProbeCommand::new("nslookup", [cfg.lookup_host.as_str()]),
        _ => ProbeCommand::new("netstat", Vec::<String>::new()),
    }
}
