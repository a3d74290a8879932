//! Session transcript and its JSON / Markdown exports.

use ai_therapy_memory::Sender;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One spoken turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptMessage {
    /// 1-based position in the session.
    pub id: usize,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Local>,
}

/// Everything said during one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub messages: Vec<TranscriptMessage>,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub total_rounds: u32,
}

impl Transcript {
    pub fn new(start_time: DateTime<Local>) -> Self {
        Self {
            messages: Vec::new(),
            start_time,
            end_time: None,
            total_rounds: 0,
        }
    }

    /// Append a turn stamped `at`.
    pub fn push(&mut self, sender: Sender, content: impl Into<String>, at: DateTime<Local>) {
        self.messages.push(TranscriptMessage {
            id: self.messages.len() + 1,
            sender,
            content: content.into(),
            timestamp: at,
        });
    }

    /// Close the transcript.
    pub fn finish(&mut self, end_time: DateTime<Local>, total_rounds: u32) {
        self.end_time = Some(end_time);
        self.total_rounds = total_rounds;
    }

    /// Render the human-readable Markdown export.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# AI Therapy Session\n\n");
        let _ = write!(
            out,
            "**Session Date:** {}\n\n",
            self.start_time.format("%B %-d, %Y at %-I:%M %p")
        );
        let duration = self
            .end_time
            .map(|end| end.signed_duration_since(self.start_time))
            .unwrap_or_else(chrono::Duration::zero);
        let _ = write!(out, "**Duration:** {}\n\n", format_duration(duration));
        let _ = write!(out, "**Total Messages:** {}\n\n", self.messages.len());
        out.push_str("---\n\n");

        for message in &self.messages {
            out.push_str(speaker_heading(message.sender));
            let _ = write!(out, "*{}*\n\n", message.timestamp.format("%-I:%M %p"));
            out.push_str(message.content.trim());
            out.push_str("\n\n---\n\n");
        }

        if let Some(end) = self.end_time {
            let _ = writeln!(out, "*Session ended at {}*", end.format("%-I:%M %p"));
        }
        out
    }

    /// Write the pretty-printed JSON export, creating parent directories.
    pub fn save_json(&self, path: &Path) -> io::Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        write_creating_parents(path, &data)
    }

    /// Write the Markdown export, creating parent directories.
    pub fn save_markdown(&self, path: &Path) -> io::Result<()> {
        write_creating_parents(path, self.to_markdown().as_bytes())
    }
}

fn speaker_heading(sender: Sender) -> &'static str {
    match sender {
        Sender::Ollama => "## <span style=\"color: #2563eb;\">🧠 Dr. Echo (Therapist)</span>\n\n",
        Sender::Claude => "## <span style=\"color: #059669;\">💭 Claude (Client)</span>\n\n",
    }
}

/// Markdown companion of a JSON transcript path.
pub fn markdown_path(json_path: &Path) -> PathBuf {
    if json_path.extension().is_some_and(|ext| ext == "json") {
        json_path.with_extension("md")
    } else {
        let mut name = json_path.as_os_str().to_os_string();
        name.push(".md");
        PathBuf::from(name)
    }
}

/// Elapsed time rounded to the second, e.g. `1h2m3s`, `4m0s`, `12s`.
fn format_duration(duration: chrono::Duration) -> String {
    let millis = duration.num_milliseconds().max(0);
    let total = (millis + 500) / 1000;
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn write_creating_parents(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)
}
