//! Post-run desktop notification.

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::probes::ProbeKind;
use crate::results::{Outcome, Payload, ResultSet};

pub const TITLE: &str = "Network Diagnostics Completed";
pub const APP_NAME: &str = "Network Diagnostics";

/// Delivers one titled message through the host's notification facility.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, title: &str, message: &str) -> Result<()>;
}

/// Shells out to the platform notifier: `notify-send` on Linux and the BSDs,
/// `osascript` on macOS, a PowerShell balloon tip on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

#[async_trait::async_trait]
impl Notifier for DesktopNotifier {
    async fn deliver(&self, title: &str, message: &str) -> Result<()> {
        let (program, args) = desktop_command(title, message);
        let output = tokio::process::Command::new(program)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("failed to launch {}", program))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn desktop_command(title: &str, message: &str) -> (&'static str, Vec<String>) {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape_quotes(message),
        escape_quotes(title)
    );
    ("osascript", vec!["-e".to_string(), script])
}

#[cfg(windows)]
fn desktop_command(title: &str, message: &str) -> (&'static str, Vec<String>) {
    let script = format!(
        "Add-Type -AssemblyName System.Windows.Forms; \
         $n = New-Object System.Windows.Forms.NotifyIcon; \
         $n.Icon = [System.Drawing.SystemIcons]::Information; \
         $n.BalloonTipTitle = '{}'; $n.BalloonTipText = '{}'; \
         $n.Visible = $true; $n.ShowBalloonTip(5000); Start-Sleep -Seconds 6; $n.Dispose()",
        title.replace('\'', "''"),
        message.replace('\'', "''")
    );
    (
        "powershell",
        vec!["-NoProfile".to_string(), "-Command".to_string(), script],
    )
}

#[cfg(not(any(windows, target_os = "macos")))]
fn desktop_command(title: &str, message: &str) -> (&'static str, Vec<String>) {
    (
        "notify-send",
        vec![
            format!("--app-name={}", APP_NAME),
            title.to_string(),
            message.to_string(),
        ],
    )
}

#[cfg(target_os = "macos")]
fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Compose the notification body. Only the bandwidth probe is summarized.
pub fn compose_message(results: &ResultSet) -> String {
    let Some(speedtest) = results.by_kind(ProbeKind::Speedtest) else {
        return "No notable results.".to_string();
    };

    let mut parts = vec![format!("Speedtest: {}", speedtest.outcome)];
    if let (
        Outcome::Completed,
        Payload::Bandwidth {
            download_mbps,
            upload_mbps,
            ping_ms,
        },
    ) = (speedtest.outcome, &speedtest.payload)
    {
        parts.push(format!(
            "Download: {:.2} Mbps, Upload: {:.2} Mbps, Ping: {:.2} ms",
            download_mbps, upload_mbps, ping_ms
        ));
    }
    parts.join("\n")
}

/// Notify the user that a run finished, if they asked for it.
///
/// Returns whether a notification was delivered. Delivery failures are
/// logged and swallowed.
pub async fn notify_completion(notifier: &dyn Notifier, results: &ResultSet, enabled: bool) -> bool {
    if !enabled {
        return false;
    }

    let message = compose_message(results);
    match notifier.deliver(TITLE, &message).await {
        Ok(()) => {
            info!("notification displayed");
            true
        }
        Err(e) => {
            error!(error = %e, "error displaying notification");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ProbeResult;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for Recording {
        async fn deliver(&self, title: &str, message: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            if self.fail {
                anyhow::bail!("no notification daemon");
            }
            Ok(())
        }
    }

    fn with_speedtest(outcome: Outcome, payload: Payload) -> ResultSet {
        ResultSet::from_results(vec![
            ProbeResult::new(ProbeKind::Ping, Outcome::Passed, Duration::from_secs(3), Payload::None),
            ProbeResult::new(ProbeKind::Speedtest, outcome, Duration::from_secs(20), payload),
        ])
        .unwrap()
    }

    #[test]
    fn test_message_for_completed_speedtest() {
        let results = with_speedtest(
            Outcome::Completed,
            Payload::Bandwidth {
                download_mbps: 250.456,
                upload_mbps: 20.0,
                ping_ms: 9.5,
            },
        );
        assert_eq!(
            compose_message(&results),
            "Speedtest: Completed\nDownload: 250.46 Mbps, Upload: 20.00 Mbps, Ping: 9.50 ms"
        );
    }

    #[test]
    fn test_message_for_failed_speedtest_has_no_figures() {
        let results = with_speedtest(
            Outcome::Error,
            Payload::Error {
                message: "timed out".to_string(),
            },
        );
        assert_eq!(compose_message(&results), "Speedtest: Error");
    }

    #[test]
    fn test_message_without_speedtest() {
        let results = ResultSet::from_results(vec![ProbeResult::new(
            ProbeKind::Netstat,
            Outcome::Passed,
            Duration::ZERO,
            Payload::None,
        )])
        .unwrap();
        assert_eq!(compose_message(&results), "No notable results.");
    }

    #[test]
    fn test_disabled_makes_no_call() {
        let notifier = Recording::default();
        let results = with_speedtest(Outcome::Completed, Payload::None);

        let delivered = tokio_test::block_on(notify_completion(&notifier, &results, false));

        assert!(!delivered);
        assert!(notifier.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enabled_delivers_once_with_title() {
        let notifier = Recording::default();
        let results = with_speedtest(Outcome::Completed, Payload::None);

        assert!(notify_completion(&notifier, &results, true).await);

        let calls = notifier.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, TITLE);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let notifier = Recording {
            fail: true,
            ..Recording::default()
        };
        let results = with_speedtest(Outcome::Completed, Payload::None);

        assert!(!notify_completion(&notifier, &results, true).await);
        assert_eq!(notifier.calls.lock().unwrap().len(), 1);
    }
}
