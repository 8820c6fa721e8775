//! One-shot status messages
//!
//! Upload handlers push messages; the status page drains them on display.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Ok,
    Err,
}

impl FlashCategory {
    /// CSS class used by the status page
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashCategory::Ok => "ok",
            FlashCategory::Err => "err",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    pub category: FlashCategory,
    pub text: String,
}

/// Shared queue of pending flash messages
#[derive(Debug, Clone, Default)]
pub struct FlashStore {
    messages: Arc<Mutex<Vec<FlashMessage>>>,
}

impl FlashStore {
    pub async fn push(&self, category: FlashCategory, text: impl Into<String>) {
        self.messages.lock().await.push(FlashMessage {
            category,
            text: text.into(),
        });
    }

    pub async fn ok(&self, text: impl Into<String>) {
        self.push(FlashCategory::Ok, text).await;
    }

    pub async fn err(&self, text: impl Into<String>) {
        self.push(FlashCategory::Err, text).await;
    }

    /// Take all pending messages, oldest first
    pub async fn drain(&self) -> Vec<FlashMessage> {
        std::mem::take(&mut *self.messages.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_empties_queue_in_order() {
        let store = FlashStore::default();
        store.ok("first").await;
        store.err("second").await;

        let drained = store.drain().await;
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].category, FlashCategory::Ok);
        assert_eq!(drained[1].text, "second");
        assert!(store.drain().await.is_empty());
    }
}
