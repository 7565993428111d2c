//! Usage accounting
//!
//! Drivers record model calls and actions here. The ledger travels with a task so the session
//! runner can report usage once the task finishes.

use std::{
    ops::AddAssign,
    time::{Duration, Instant},
};

use serde::Serialize;

/// Token counts for one or more model calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u64,

    /// Completion tokens
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Create a usage record.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// Prompt and completion tokens together.
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(rhs.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(rhs.completion_tokens);
    }
}

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The driver deciding on actions
    Driver,

    /// A dispatched action's result
    Action,

    /// The runner itself
    Runner,
}

/// One line of a task transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    /// Who produced it
    pub speaker: Speaker,

    /// What was said
    pub text: String,
}

/// Usage and transcript for a single task.
#[derive(Debug)]
pub struct UsageLedger {
    started: Instant,
    usage: TokenUsage,
    model_calls: u32,
    actions: u32,
    transcript: Vec<TranscriptEntry>,
}

impl Default for UsageLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageLedger {
    /// Start an empty ledger.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            usage: TokenUsage::default(),
            model_calls: 0,
            actions: 0,
            transcript: Vec::new(),
        }
    }

    /// Record a model call and its token usage.
    pub fn record_model_call(&mut self, usage: TokenUsage) {
        self.model_calls += 1;
        self.usage += usage;
    }

    /// Record a dispatched action and a rendering of its result.
    pub fn record_action(&mut self, action: impl Into<String>, result: impl Into<String>) {
        self.actions += 1;

        self.transcript.push(TranscriptEntry {
            speaker: Speaker::Driver,
            text: action.into(),
        });

        self.transcript.push(TranscriptEntry {
            speaker: Speaker::Action,
            text: result.into(),
        });
    }

    /// Add a runner note to the transcript.
    pub fn note(&mut self, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            speaker: Speaker::Runner,
            text: text.into(),
        });
    }

    /// Tokens used so far.
    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// Model calls made so far.
    pub fn model_calls(&self) -> u32 {
        self.model_calls
    }

    /// Actions dispatched so far.
    pub fn actions(&self) -> u32 {
        self.actions
    }

    /// Transcript entries in order.
    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Time since the ledger was started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Summarise the ledger for reporting.
    pub fn report(&self, model: &str) -> UsageReport {
        UsageReport {
            model: model.to_string(),
            duration_sec: self.elapsed().as_secs_f64(),
            usage: self.usage,
            model_calls: self.model_calls,
            actions: self.actions,
        }
    }
}

/// Usage as reported to the benchmark service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    /// Model identifier
    pub model: String,

    /// Wall time spent on the task
    pub duration_sec: f64,

    /// Tokens consumed
    pub usage: TokenUsage,

    /// Model calls made
    pub model_calls: u32,

    /// Actions dispatched
    pub actions: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_calls_accumulate_usage() {
        let mut ledger = UsageLedger::new();

        ledger.record_model_call(TokenUsage::new(100, 20));
        ledger.record_model_call(TokenUsage::new(50, 5));

        assert_eq!(ledger.model_calls(), 2);
        assert_eq!(ledger.usage(), TokenUsage::new(150, 25));
        assert_eq!(ledger.usage().total_tokens(), 175);
    }

    #[test]
    fn actions_add_two_transcript_entries() {
        let mut ledger = UsageLedger::new();

        ledger.note("task started");
        ledger.record_action("view_basket", "empty");

        assert_eq!(ledger.actions(), 1);
        assert_eq!(ledger.transcript().len(), 3);
        assert_eq!(
            ledger.transcript().last().map(|entry| entry.speaker),
            Some(Speaker::Action)
        );
    }

    #[test]
    fn report_carries_counters() {
        let mut ledger = UsageLedger::new();

        ledger.record_model_call(TokenUsage::new(10, 1));

        let report = ledger.report("scripted");

        assert_eq!(report.model, "scripted");
        assert_eq!(report.model_calls, 1);
        assert_eq!(report.usage.total_tokens(), 11);
    }
}
