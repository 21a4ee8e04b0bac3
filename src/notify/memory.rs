//! In-memory sink that records every message

use async_trait::async_trait;
use std::sync::Mutex;

use super::NotificationSink;

#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages delivered so far, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Number of delivered messages containing `marker`
    pub fn count_containing(&self, marker: &str) -> usize {
        self.messages()
            .iter()
            .filter(|m| m.contains(marker))
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.clear();
        }
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn send_message(&self, text: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_counts() {
        let sink = MemorySink::new();
        sink.send_message("RETRY ATTEMPT 1").await;
        sink.send_message("RETRY ATTEMPT 2").await;
        sink.send_message("FAILURE").await;

        assert_eq!(sink.messages().len(), 3);
        assert_eq!(sink.count_containing("RETRY ATTEMPT"), 2);

        sink.clear();
        assert!(sink.messages().is_empty());
    }
}
