use formflow_contract::Message;

/// Keeps only the most recent `max_messages` messages.
///
/// A limit of zero disables trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepLastTrimmer {
    max_messages: usize,
}

impl KeepLastTrimmer {
    pub fn new(max_messages: usize) -> Self {
        Self { max_messages }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn trim(&self, mut history: Vec<Message>) -> Vec<Message> {
        if self.max_messages == 0 || history.len() <= self.max_messages {
            return history;
        }
        let excess = history.len() - self.max_messages;
        tracing::debug!(dropped = excess, kept = self.max_messages, "trimming history");
        history.drain(..excess);
        history
    }
}
