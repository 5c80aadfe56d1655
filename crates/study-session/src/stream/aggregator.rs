/// Running concatenation of one model call's text deltas.
///
/// A fresh aggregator is used per call. Every accepted delta yields the full
/// text so far, since consumers replace what they display instead of
/// appending to it.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    buffer: String,
    deltas: usize,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta and return the accumulated text. Empty deltas change
    /// nothing and return `None`.
    pub fn push_delta(&mut self, delta: &str) -> Option<&str> {
        if delta.is_empty() {
            return None;
        }
        self.buffer.push_str(delta);
        self.deltas += 1;
        Some(&self.buffer)
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    /// The corrective value to emit once the authoritative text is known:
    /// `Some(final)` when it is non-empty and differs from the concatenated
    /// deltas, `None` otherwise.
    pub fn reconcile(&self, final_text: Option<&str>) -> Option<String> {
        match final_text {
            Some(text) if !text.is_empty() && text != self.buffer => Some(text.to_string()),
            _ => None,
        }
    }

    pub fn into_text(self) -> String {
        self.buffer
    }
}
