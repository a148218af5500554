//! Terminal presentation: progress bars and the run summary.

use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use std::time::Instant;

use colored::Colorize;
use tokio::sync::mpsc;

use crate::progress::{ProgressEvent, COMPLETE};
use crate::results::{format_duration, Outcome, Payload, ResultSet, DIVIDER};

const BAR_WIDTH: usize = 20;
const LABEL_WIDTH: usize = 34;

/// Draws output either styled for a terminal or as plain text.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Color and screen control only when stdout is a terminal.
    pub fn for_terminal() -> Self {
        Self::new(std::io::stdout().is_terminal())
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn success(&self, text: &str) -> String {
        if self.color {
            text.green().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn failure(&self, text: &str) -> String {
        if self.color {
            text.bright_red().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn banner(&self) -> String {
        let title = "==== Network Diagnostics ====";
        if self.color {
            format!("{}\n", title.bright_yellow().bold())
        } else {
            format!("{}\n", title)
        }
    }

    /// ANSI clear-screen; nothing when output is not a terminal.
    pub fn clear_screen(&self) -> &'static str {
        if self.color {
            "\x1B[2J\x1B[1;1H"
        } else {
            ""
        }
    }

    fn outcome(&self, outcome: Outcome) -> String {
        let text = outcome.to_string();
        if outcome.is_success() {
            self.success(&text)
        } else {
            self.failure(&text)
        }
    }

    /// One progress line: label, bar, percentage, elapsed time.
    pub fn progress_line(&self, description: &str, percent: u8, elapsed: std::time::Duration) -> String {
        let percent = percent.min(COMPLETE);
        let filled = BAR_WIDTH * usize::from(percent) / usize::from(COMPLETE);
        let bar = format!("{}{}", "━".repeat(filled), " ".repeat(BAR_WIDTH - filled));
        let bar = if self.color && percent == COMPLETE {
            bar.green().to_string()
        } else if self.color {
            bar.magenta().to_string()
        } else {
            bar
        };
        let secs = elapsed.as_secs();
        format!(
            "{:>width$} {} {:>3}% {}:{:02}:{:02}",
            description,
            bar,
            percent,
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60,
            width = LABEL_WIDTH
        )
    }

    /// Full run summary printed after the probes finish.
    pub fn summary(&self, results: &ResultSet) -> String {
        let mut out = String::from("\n===== Network Diagnostic Summary =====\n");
        let last = results.len().saturating_sub(1);

        for (index, r) in results.iter().enumerate() {
            out.push_str(&format!("\n{}:\n\n", r.name));
            out.push_str(&format!("  Result: {}\n\n", self.outcome(r.outcome)));
            out.push_str(&format!("  Execution Time: {}\n\n", format_duration(r.duration)));

            match &r.payload {
                Payload::Bandwidth {
                    download_mbps,
                    upload_mbps,
                    ping_ms,
                } if r.outcome == Outcome::Completed => {
                    out.push_str(&format!("  Download Speed: {:.2} Mbps\n", download_mbps));
                    out.push_str(&format!("  Upload Speed: {:.2} Mbps\n", upload_mbps));
                    out.push_str(&format!("  Ping: {:.2} ms\n", ping_ms));
                }
                Payload::PublicIp { ip } => out.push_str(&format!("  IP: {}\n", ip)),
                Payload::Error { message } => {
                    out.push_str(&format!("  Error: {}\n", self.failure(message)))
                }
                _ => {}
            }

            if index < last {
                out.push_str(DIVIDER);
                out.push_str("\n\n");
            }
        }

        out.push_str("=========== End of Summary ===========\n");
        out
    }

    /// Compact summary shown above the post-test menu.
    pub fn compact_summary(&self, results: &ResultSet) -> String {
        let mut out = String::from("\n============== Summary ===============\n");
        let last = results.len().saturating_sub(1);

        for (index, r) in results.iter().enumerate() {
            out.push_str(&format!("{}: {}\n", r.name, self.outcome(r.outcome)));
            out.push_str(&format!("Execution Time: {}\n", format_duration(r.duration)));
            if let Payload::Bandwidth {
                download_mbps,
                upload_mbps,
                ping_ms,
            } = &r.payload
            {
                out.push_str(&format!("Download Speed: {:.2} Mbps\n", download_mbps));
                out.push_str(&format!("Upload Speed: {:.2} Mbps\n", upload_mbps));
                out.push_str(&format!("Ping: {:.2} ms\n", ping_ms));
            }
            if index < last {
                out.push_str(DIVIDER);
                out.push('\n');
            }
        }
        out
    }
}

struct Bar {
    description: String,
    percent: u8,
    started: Instant,
}

/// Consume progress events and redraw the active bar until the channel
/// closes. Finished bars stay on screen, followed by a completion line.
pub async fn draw_progress<W: Write>(
    renderer: Renderer,
    mut events: mpsc::UnboundedReceiver<ProgressEvent>,
    mut out: W,
) -> std::io::Result<()> {
    let mut bars: HashMap<usize, Bar> = HashMap::new();

    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Started { task, description } => {
                bars.insert(
                    task,
                    Bar {
                        description,
                        percent: 0,
                        started: Instant::now(),
                    },
                );
            }
            ProgressEvent::Update { task, percent } => {
                if let Some(bar) = bars.get_mut(&task) {
                    bar.percent = percent;
                }
            }
            ProgressEvent::Relabel { task, description } => {
                if let Some(bar) = bars.get_mut(&task) {
                    bar.description = description;
                }
            }
            ProgressEvent::Finished { task } => {
                if let Some(bar) = bars.remove(&task) {
                    let line = renderer.progress_line(&bar.description, COMPLETE, bar.started.elapsed());
                    writeln!(out, "\r{}", line)?;
                    out.flush()?;
                }
                continue;
            }
        }

        for bar in bars.values() {
            let line = renderer.progress_line(&bar.description, bar.percent, bar.started.elapsed());
            write!(out, "\r{}", line)?;
        }
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::ProbeKind;
    use crate::results::ProbeResult;
    use std::time::Duration;

    fn results() -> ResultSet {
        ResultSet::from_results(vec![
            ProbeResult::new(ProbeKind::Ping, Outcome::Failed, Duration::from_secs(4), Payload::None),
            ProbeResult::new(
                ProbeKind::Speedtest,
                Outcome::Completed,
                Duration::from_millis(18_500),
                Payload::Bandwidth {
                    download_mbps: 512.0,
                    upload_mbps: 48.25,
                    ping_ms: 7.0,
                },
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_summary_plain_text() {
        let text = Renderer::plain().summary(&results());
        assert!(text.starts_with("\n===== Network Diagnostic Summary =====\n"));
        assert!(text.contains("Ping Test:\n\n  Result: Failed\n\n  Execution Time: 0:00:04\n"));
        assert!(text.contains("  Download Speed: 512.00 Mbps\n"));
        assert!(text.contains("  Upload Speed: 48.25 Mbps\n"));
        assert!(text.contains("  Ping: 7.00 ms\n"));
        assert_eq!(text.matches(DIVIDER).count(), 1);
        assert!(text.ends_with("=========== End of Summary ===========\n"));
    }

    #[test]
    fn test_empty_summary_has_header_and_footer_only() {
        let text = Renderer::plain().summary(&ResultSet::new());
        assert!(!text.contains(DIVIDER));
        assert!(text.contains("End of Summary"));
    }

    #[test]
    fn test_compact_summary_lines() {
        let text = Renderer::plain().compact_summary(&results());
        assert!(text.contains("Ping Test: Failed\nExecution Time: 0:00:04\n"));
        assert!(text.contains("Speedtest: Completed\nExecution Time: 0:00:18.500000\n"));
    }

    #[test]
    fn test_progress_line_clamps_and_fills() {
        let r = Renderer::plain();
        let full = r.progress_line("Running Ping Test...", 100, Duration::from_secs(65));
        assert!(full.ends_with("100% 0:01:05"));
        assert_eq!(full.matches('━').count(), BAR_WIDTH);

        let half = r.progress_line("x", 50, Duration::ZERO);
        assert_eq!(half.matches('━').count(), BAR_WIDTH / 2);
        assert!(half.contains(" 50% "));
    }

    #[tokio::test]
    async fn test_draw_progress_writes_final_line() {
        let (sink, rx) = crate::progress::ProgressSink::channel();
        sink.start(0, "Running Netstat...");
        sink.update(0, 40);
        sink.finish(0);
        drop(sink);

        let mut buf = Vec::new();
        draw_progress(Renderer::plain(), rx, &mut buf).await.unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains(" 40% "));
        assert!(text.trim_end().ends_with("0:00:00"));
        let done = format!("Running Netstat... {} 100%", "━".repeat(BAR_WIDTH));
        assert!(text.contains(&done));
    }
}
