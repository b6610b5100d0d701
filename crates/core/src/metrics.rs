use crate::tools::ToolName;

/// Per-session usage counters. Collected as tool calls run and logged
/// once when the session ends.
#[derive(Debug, Default)]
pub struct UsageCollector {
    details_stored: u64,
    generation_requests: u64,
    answers_saved: u64,
    failed_calls: u64,
}

impl UsageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&mut self, tool: ToolName) {
        match tool {
            ToolName::StoreUserDetails => self.details_stored += 1,
            ToolName::RequestQuestionGeneration => self.generation_requests += 1,
            ToolName::SaveAnswer => self.answers_saved += 1,
        }
    }

    pub fn record_failure(&mut self) {
        self.failed_calls += 1;
    }

    pub fn summary(&self) -> String {
        format!(
            "details_stored={} generation_requests={} answers_saved={} failed_calls={}",
            self.details_stored, self.generation_requests, self.answers_saved, self.failed_calls
        )
    }
}
