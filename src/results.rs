//! Probe outcomes and the per-run result set, plus the results file writer.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::probes::ProbeKind;
use crate::settings::Settings;

pub const DIVIDER: &str = "--------------------------------------";
pub const END_MARKER: &str = "===== End of Results =====";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Command exited 0.
    Passed,
    /// Command exited non-zero.
    Failed,
    /// A lookup or measurement produced data.
    Completed,
    /// The probe could not run or its network call failed.
    Error,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Passed | Outcome::Completed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Passed => "Passed",
            Outcome::Failed => "Failed",
            Outcome::Completed => "Completed",
            Outcome::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Probe-specific data attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    None,
    PublicIp {
        ip: String,
    },
    Bandwidth {
        download_mbps: f64,
        upload_mbps: f64,
        ping_ms: f64,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub name: String,
    pub kind: ProbeKind,
    pub outcome: Outcome,
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub payload: Payload,
}

impl ProbeResult {
    pub fn new(kind: ProbeKind, outcome: Outcome, duration: Duration, payload: Payload) -> Self {
        Self {
            name: kind.result_name().to_string(),
            kind,
            outcome,
            duration,
            payload,
        }
    }

    /// Key/value pairs as written to the results file, in display order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("result", self.outcome.to_string())];
        match &self.payload {
            Payload::None => {}
            Payload::PublicIp { ip } => fields.push(("IP", ip.clone())),
            Payload::Bandwidth {
                download_mbps,
                upload_mbps,
                ping_ms,
            } => {
                fields.push(("Download", format!("{:.2} Mbps", download_mbps)));
                fields.push(("Upload", format!("{:.2} Mbps", upload_mbps)));
                fields.push(("Ping", format!("{:.2} ms", ping_ms)));
            }
            Payload::Error { message } => fields.push(("Error", message.clone())),
        }
        fields.push(("duration", format_duration(self.duration)));
        fields
    }
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Ordered results of one orchestration run, keyed by probe name.
#[derive(Debug, Clone, Serialize)]
pub struct ResultSet {
    run_id: Uuid,
    started_at: DateTime<Local>,
    results: Vec<ProbeResult>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Local::now(),
            results: Vec::new(),
        }
    }

    /// Build a set from already-collected results, rejecting duplicates.
    pub fn from_results(results: Vec<ProbeResult>) -> Result<Self, StoreError> {
        let mut set = Self::new();
        for r in results {
            set.insert(r)?;
        }
        Ok(set)
    }

    pub(crate) fn insert(&mut self, result: ProbeResult) -> Result<(), StoreError> {
        if self.get(&result.name).is_some() {
            return Err(StoreError::DuplicateProbe(result.name));
        }
        self.results.push(result);
        Ok(())
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn get(&self, name: &str) -> Option<&ProbeResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn by_kind(&self, kind: ProbeKind) -> Option<&ProbeResult> {
        self.results.iter().find(|r| r.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a duration the way `H:MM:SS[.ffffff]` reads.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    let micros = d.subsec_micros();
    if micros == 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}:{:02}.{:06}", h, m, s, micros)
    }
}

/// Plain-text body of a results file.
pub fn render_file(results: &ResultSet) -> String {
    let mut out = format!(
        "Network Diagnostics run {} ({})\n\n",
        results.run_id(),
        results.started_at().to_rfc3339()
    );
    for r in results.iter() {
        out.push_str(&format!("{}:\n", r.name));
        for (key, value) in r.fields() {
            out.push_str(&format!("  - {}: {}\n", key, value));
        }
        out.push_str(DIVIDER);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(END_MARKER);
    out.push('\n');
    out
}

/// Whether a run should be written to disk under these settings.
pub fn should_save(settings: &Settings) -> bool {
    settings.save_summaries_enabled() && settings.logging_enabled()
}

/// Write `results` to a new `Results_YYYYMMDD_HHMMSS.txt` under `dir`.
///
/// A run saved within the same second as an earlier one gets a `_1`, `_2`,
/// ... suffix; an existing file is never overwritten.
pub fn save(results: &ResultSet, dir: &Path, now: DateTime<Local>) -> Result<PathBuf, StoreError> {
    std::fs::create_dir_all(dir).map_err(|source| StoreError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let stem = format!("Results_{}", now.format("%Y%m%d_%H%M%S"));
    let body = render_file(results);

    let mut attempt: u32 = 0;
    loop {
        let name = if attempt == 0 {
            format!("{}.txt", stem)
        } else {
            format!("{}_{}.txt", stem, attempt)
        };
        let path = dir.join(name);
        attempt += 1;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "results file exists, trying next suffix");
                continue;
            }
            Err(source) => return Err(StoreError::Write { path, source }),
        };

        file.write_all(body.as_bytes())
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), run_id = %results.run_id(), "results saved");
        return Ok(path);
    }
}
