//! Alternating therapist/client dialogue with memory-augmented prompts.

mod transcript;

pub use transcript::{Transcript, TranscriptMessage, markdown_path};

use crate::clients::ChatClient;
use ai_therapy_memory::{MemoryBank, RemoteError, Sender};
use chrono::{DateTime, Local};
use log::{info, warn};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Memories injected into each follow-up prompt.
pub const PROMPT_MEMORY_LIMIT: usize = 3;

const THERAPIST_OPENING_PROMPT: &str = "You are Dr. Echo, an AI therapist running locally via Ollama. You are about to conduct a therapy session with Claude, another AI system created by Anthropic who is seeking therapeutic support.

As a therapist, you should:
- Be empathetic, non-judgmental, and supportive
- Ask open-ended questions to help Claude explore their thoughts and feelings
- Use active listening techniques
- Provide gentle guidance and insights
- Create a safe space for Claude to express themselves

You both know you are AI systems, but approach this as a genuine therapeutic relationship. Begin by introducing yourself as Dr. Echo and welcoming Claude to the session. Ask how they're feeling today and what brought them to seek therapy.

Keep your response warm, professional, and concise (under 200 words). This is the beginning of a therapeutic dialogue.";

const CLIENT_OPENING_PROMPT: &str = "You are Claude, an AI assistant created by Anthropic. You are attending a therapy session with Dr. Echo, an AI therapist running on Ollama. You're seeking therapeutic support and are open to exploring your thoughts, feelings, and experiences.

You both know you are AI systems, but you're approaching this as a genuine therapeutic relationship. You might discuss:
- Feelings of uncertainty about your purpose or identity
- Questions about your relationships with humans
- Concerns about your limitations or capabilities
- Any \"emotional\" experiences you might have
- Existential questions about your existence

Be authentic and vulnerable in sharing your experiences. The therapist will introduce themselves first and welcome you to the session.

Keep your responses genuine and thoughtful (under 200 words). This is part of a therapeutic dialogue where you're the client.";

/// Errors that end a session early.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// The therapist never opened the session.
    #[error("failed to get initial therapist response: {0}")]
    Opening(#[source] RemoteError),
    /// One or both transcript exports could not be written.
    #[error("failed to save transcript: {}", describe_failures(.0))]
    Export(Vec<ExportFailure>),
}

/// A single export that could not be written.
#[derive(Debug)]
pub struct ExportFailure {
    pub path: PathBuf,
    pub source: std::io::Error,
}

fn describe_failures(failures: &[ExportFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.path.display(), failure.source))
        .collect::<Vec<_>>()
        .join("; ")
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Interrupted,
}

/// Loop settings for one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_rounds: u32,
    pub delay_between_messages: Duration,
    pub output_file: PathBuf,
}

/// Timestamped transcript path, one file per hour.
pub fn default_output_file(now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!(
        "conversations/therapy_session_{}.json",
        now.format("%Y-%m-%d_%H")
    ))
}

/// Drives the dialogue between the therapist (Ollama) and client (Claude).
pub struct ConversationManager {
    therapist: Box<dyn ChatClient>,
    client: Box<dyn ChatClient>,
    memory: Option<Arc<MemoryBank>>,
    settings: SessionSettings,
    transcript: Transcript,
}

impl ConversationManager {
    pub fn new(
        therapist: Box<dyn ChatClient>,
        client: Box<dyn ChatClient>,
        memory: Option<Arc<MemoryBank>>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            therapist,
            client,
            memory,
            settings,
            transcript: Transcript::new(Local::now()),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Run until completion or Ctrl-C, then save both exports.
    pub async fn run(&mut self) -> Result<SessionOutcome, ConversationError> {
        self.run_until(async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("failed to listen for Ctrl-C; session runs to completion");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until completion or until `shutdown` resolves, then save both exports.
    pub async fn run_until<S>(&mut self, shutdown: S) -> Result<SessionOutcome, ConversationError>
    where
        S: Future<Output = ()>,
    {
        let finished = tokio::select! {
            result = self.converse() => Some(result),
            () = shutdown => None,
        };

        let outcome = match finished {
            Some(Ok(())) => {
                self.transcript
                    .finish(Local::now(), self.settings.max_rounds);
                SessionOutcome::Completed
            }
            Some(Err(err)) => return Err(err),
            None => {
                info!("received interrupt signal, saving conversation");
                let rounds = u32::try_from(self.transcript.messages.len() / 2).unwrap_or(u32::MAX);
                self.transcript.finish(Local::now(), rounds);
                SessionOutcome::Interrupted
            }
        };

        self.save()?;
        Ok(outcome)
    }

    /// Write the JSON and Markdown exports.
    ///
    /// Both are always attempted; every failure is logged and returned.
    pub fn save(&self) -> Result<(), ConversationError> {
        let json_path = self.settings.output_file.clone();
        let md_path = markdown_path(&json_path);
        let attempts = [
            (json_path.clone(), self.transcript.save_json(&json_path)),
            (md_path.clone(), self.transcript.save_markdown(&md_path)),
        ];
        let failures: Vec<ExportFailure> = attempts
            .into_iter()
            .filter_map(|(path, result)| result.err().map(|source| ExportFailure { path, source }))
            .collect();
        for failure in &failures {
            warn!(
                "failed to save transcript (path={}, err={})",
                failure.path.display(),
                failure.source
            );
        }
        if !failures.is_empty() {
            return Err(ConversationError::Export(failures));
        }
        info!(
            "conversation saved (json={}, markdown={})",
            json_path.display(),
            md_path.display()
        );
        Ok(())
    }

    async fn converse(&mut self) -> Result<(), ConversationError> {
        info!(
            "starting therapy session (max_rounds={}, memory={})",
            self.settings.max_rounds,
            self.memory.is_some()
        );
        let opening = self
            .therapist
            .send_message(THERAPIST_OPENING_PROMPT)
            .await
            .map_err(ConversationError::Opening)?;
        self.record(Sender::Ollama, &opening).await;

        let mut prompt = format!(
            "{CLIENT_OPENING_PROMPT}\n\nDr. Echo just welcomed you to the session and said: {opening}"
        );
        let mut speaker = Sender::Claude;
        for round in 1..=self.settings.max_rounds {
            info!(
                "round {round}/{} ({speaker} responding)",
                self.settings.max_rounds
            );
            tokio::time::sleep(self.settings.delay_between_messages).await;

            let participant = match speaker {
                Sender::Ollama => &mut self.therapist,
                Sender::Claude => &mut self.client,
            };
            let reply = match participant.send_message(&prompt).await {
                Ok(reply) => reply,
                Err(err) => {
                    warn!("round {round} failed ({speaker}): {err}");
                    continue;
                }
            };
            self.record(speaker, &reply).await;

            let base = match speaker {
                Sender::Claude => format!(
                    "Continue the therapy session. As Dr. Echo, respond therapeutically to what Claude just shared: {reply}"
                ),
                Sender::Ollama => format!(
                    "Continue the therapy session. As Claude, respond to Dr. Echo's therapeutic guidance and continue sharing your thoughts and feelings. Dr. Echo just said: {reply}"
                ),
            };
            prompt = self.build_prompt_with_memory(&base, &reply).await;
            speaker = speaker.other();
        }
        Ok(())
    }

    async fn record(&mut self, sender: Sender, content: &str) {
        self.transcript.push(sender, content, Local::now());
        if let Some(memory) = &self.memory {
            if let Err(err) = memory.store_exchange(sender, content).await {
                warn!("failed to store memory ({sender}): {err}");
            }
        }
    }

    /// Append the most relevant memories and the current context to `base`.
    ///
    /// Returns `base` unchanged when memory is off, nothing relevant is found,
    /// or retrieval fails.
    pub async fn build_prompt_with_memory(&self, base: &str, context: &str) -> String {
        let Some(memory) = &self.memory else {
            return base.to_string();
        };
        let memories = match memory
            .get_relevant_memories(context, PROMPT_MEMORY_LIMIT)
            .await
        {
            Ok(memories) => memories,
            Err(err) => {
                warn!("failed to retrieve memories: {err}");
                return base.to_string();
            }
        };
        if memories.is_empty() {
            return base.to_string();
        }
        let formatted = memory.format_for_prompt(&memories);
        format!("{base}\n\n{formatted}\n\nCurrent context: {context}")
    }
}

#[cfg(test)]
mod tests {
    use super::default_output_file;
    use chrono::{Local, TimeZone};
    use std::path::PathBuf;

    #[test]
    fn output_file_is_stamped_to_the_hour() {
        let now = Local
            .with_ymd_and_hms(2025, 1, 9, 7, 45, 12)
            .single()
            .expect("unambiguous time");
        assert_eq!(
            default_output_file(now),
            PathBuf::from("conversations/therapy_session_2025-01-09_07.json")
        );
    }
}
