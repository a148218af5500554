//! One-time setup: desktop launcher and external tool check.
//!
//! Nothing here is fatal. Each step reports what it could not do so the
//! user can fix it by hand.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ProbesConfig;
use crate::probes::{ProbeAction, ProbeKind};

pub const LAUNCHER_NAME: &str = "Network Diagnostics";

#[derive(Debug, Clone, Serialize)]
pub struct ToolCheck {
    pub probe: &'static str,
    pub program: String,
    pub found: bool,
    pub install_hint: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SetupReport {
    pub launcher: Option<PathBuf>,
    pub launcher_error: Option<String>,
    pub tools: Vec<ToolCheck>,
}

impl SetupReport {
    pub fn missing(&self) -> impl Iterator<Item = &ToolCheck> {
        self.tools.iter().filter(|t| !t.found)
    }
}

/// Create the desktop launcher and check probe dependencies.
pub fn run(cfg: &ProbesConfig) -> SetupReport {
    let (launcher, launcher_error) = match desktop_dir().and_then(|desktop| {
        let exe = std::env::current_exe().context("cannot locate the running executable")?;
        create_launcher(&desktop, &exe)
    }) {
        Ok(path) => {
            info!(path = %path.display(), "shortcut created on the desktop");
            (Some(path), None)
        }
        Err(e) => {
            warn!(error = %e, "error in shortcut creation process");
            (None, Some(format!("{:#}", e)))
        }
    };

    let tools = check_tools(cfg, std::env::var_os("PATH").as_deref());
    for tool in tools.iter().filter(|t| !t.found) {
        warn!(program = %tool.program, probe = tool.probe, "probe dependency missing");
    }

    SetupReport {
        launcher,
        launcher_error,
        tools,
    }
}

fn desktop_dir() -> Result<PathBuf> {
    let dirs = directories::UserDirs::new().context("cannot determine the home directory")?;
    dirs.desktop_dir()
        .map(Path::to_path_buf)
        .context("no desktop directory for this user")
}

/// Write a launcher for `exe` into `desktop` and return its path.
pub fn create_launcher(desktop: &Path, exe: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(desktop)
        .with_context(|| format!("failed to create {}", desktop.display()))?;

    let (file_name, contents) = launcher_contents(exe);
    let path = desktop.join(file_name);
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write launcher {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("failed to mark {} executable", path.display()))?;
    }

    Ok(path)
}

#[cfg(windows)]
pub fn launcher_contents(exe: &Path) -> (String, String) {
    (
        format!("{}.bat", LAUNCHER_NAME),
        format!("@echo off\r\n\"{}\"\r\n", exe.display()),
    )
}

#[cfg(target_os = "macos")]
pub fn launcher_contents(exe: &Path) -> (String, String) {
    (
        format!("{}.command", LAUNCHER_NAME),
        format!("#!/bin/sh\nexec \"{}\"\n", exe.display()),
    )
}

#[cfg(not(any(windows, target_os = "macos")))]
pub fn launcher_contents(exe: &Path) -> (String, String) {
    (
        "network-diagnostics.desktop".to_string(),
        format!(
            "[Desktop Entry]\nType=Application\nName={}\nExec=\"{}\"\nTerminal=true\nCategories=Network;Utility;\n",
            LAUNCHER_NAME,
            exe.display()
        ),
    )
}

/// Look up every command probe's program on `path_var`.
pub fn check_tools(cfg: &ProbesConfig, path_var: Option<&OsStr>) -> Vec<ToolCheck> {
    let mut checks: Vec<ToolCheck> = Vec::new();
    for kind in ProbeKind::ALL {
        let ProbeAction::Command(cmd) = kind.action(cfg) else {
            continue;
        };
        if checks.iter().any(|c| c.program == cmd.program) {
            continue;
        }
        checks.push(ToolCheck {
            probe: kind.settings_key(),
            found: find_in_path(&cmd.program, path_var).is_some(),
            install_hint: install_hint(&cmd.program),
            program: cmd.program,
        });
    }
    checks
}

pub fn find_in_path(program: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let path_var = path_var?;
    std::env::split_paths(path_var).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{}.exe", program));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

fn install_hint(program: &str) -> &'static str {
    match program {
        "traceroute" => "Install the 'traceroute' package (e.g. sudo apt install traceroute)",
        "nslookup" => "Install DNS utilities (e.g. sudo apt install dnsutils / bind-utils)",
        "netstat" => "Install 'net-tools' (e.g. sudo apt install net-tools)",
        "ip" => "Install 'iproute2'",
        "resolvectl" => "Requires systemd-resolved",
        "ping" => "Install 'iputils-ping'",
        _ => "Ships with the operating system",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_launcher_points_at_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = Path::new("/opt/netdiag/bin/netdiag");

        let path = create_launcher(&dir.path().join("Desktop"), exe).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();

        assert!(path.exists());
        assert!(contents.contains("/opt/netdiag/bin/netdiag"));
    }

    #[cfg(unix)]
    #[test]
    fn test_launcher_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = create_launcher(dir.path(), Path::new("/usr/bin/netdiag")).unwrap();
        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn test_find_in_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = if cfg!(windows) { "probe-tool.exe" } else { "probe-tool" };
        std::fs::write(dir.path().join(tool), "").unwrap();
        let path_var = std::env::join_paths([dir.path()]).unwrap();

        assert!(find_in_path("probe-tool", Some(&path_var)).is_some());
        assert!(find_in_path("absent-tool", Some(&path_var)).is_none());
        assert!(find_in_path("probe-tool", None).is_none());
    }

    #[test]
    fn test_check_tools_with_empty_path_reports_everything_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path_var = std::env::join_paths([dir.path()]).unwrap();
        let checks = check_tools(&ProbesConfig::default(), Some(&path_var));

        assert!(!checks.is_empty());
        assert!(checks.iter().all(|c| !c.found));
        // netstat is shared by nothing else, ping appears once.
        assert_eq!(checks.iter().filter(|c| c.program == "ping").count(), 1);
        assert!(checks.iter().all(|c| !c.install_hint.is_empty()));
    }
}
