//! Operational notifications
//!
//! A [`NotificationSink`] delivers pre-formatted text and never fails toward
//! its caller. [`Notifier`] owns the message layouts (HTML parse mode) and is
//! what the rest of the engine talks to.

pub mod memory;
pub mod telegram;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use memory::MemorySink;
pub use telegram::TelegramSink;

/// Best-effort outbound messaging channel
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `text`. Failures are logged inside the sink and swallowed.
    async fn send_message(&self, text: &str);
}

/// Why the process is stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl-C
    Manual,
    /// SIGTERM
    System,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::Manual => "Manual shutdown",
            ShutdownReason::System => "System shutdown",
        }
    }
}

/// Optional fields of a success message
#[derive(Debug, Clone, Default)]
pub struct SuccessDetails {
    pub wallet: Option<String>,
    pub tx_hash: Option<String>,
    pub balance: Option<f64>,
    pub file_size_kb: Option<f64>,
    pub summary: Option<String>,
}

/// Attempt information attached to a failure message
#[derive(Debug, Clone, Default)]
pub struct FailureDetails {
    pub wallet: Option<String>,
    pub attempt: Option<u32>,
    pub max_retries: Option<u32>,
}

/// Cumulative figures for the periodic report
#[derive(Debug, Clone)]
pub struct PeriodicReport {
    pub total_runs: u64,
    pub successful: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub features: Vec<(String, u64)>,
    pub uptime: String,
}

/// Message formatter bound to a sink
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    native_symbol: String,
}

fn now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Escape text interpolated into HTML-mode messages
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, native_symbol: impl Into<String>) -> Self {
        Self {
            sink,
            native_symbol: native_symbol.into(),
        }
    }

    /// Send raw pre-formatted text
    pub async fn send(&self, text: &str) {
        self.sink.send_message(text).await;
    }

    pub async fn send_startup(&self, features: &[String], dex_features: &[String]) {
        let dex = if dex_features.is_empty() {
            "none".to_string()
        } else {
            dex_features.join(", ")
        };
        let message = format!(
            "<b>🚀 AUTOMATION STARTED</b>\n\
             <b>Time:</b> {}\n\
             <b>Features:</b> {}\n\
             <b>DEX Features:</b> {}\n\
             <b>Status:</b> Running continuously",
            now(),
            escape_html(&features.join(", ")),
            escape_html(&dex),
        );
        self.send(&message).await;
    }

    pub async fn send_shutdown(&self, reason: ShutdownReason) {
        let message = format!(
            "<b>🛑 AUTOMATION STOPPED</b>\n\
             <b>Time:</b> {}\n\
             <b>Status:</b> {}",
            now(),
            reason.as_str()
        );
        self.send(&message).await;
    }

    pub async fn send_success(&self, feature: &str, details: &SuccessDetails) {
        let mut message = format!(
            "<b>✅ SUCCESS</b>\n<b>Feature:</b> {}\n<b>Time:</b> {}\n",
            escape_html(feature),
            now()
        );
        if let Some(wallet) = &details.wallet {
            message.push_str(&format!("<b>Wallet:</b> <code>{}</code>\n", wallet));
        }
        if let Some(tx_hash) = &details.tx_hash {
            message.push_str(&format!("<b>Transaction:</b> <code>{}</code>\n", tx_hash));
        }
        if let Some(balance) = details.balance {
            message.push_str(&format!(
                "<b>Balance:</b> {:.6} {}\n",
                balance, self.native_symbol
            ));
        }
        if let Some(size) = details.file_size_kb {
            message.push_str(&format!("<b>File Size:</b> {:.2} KB\n", size));
        }
        if let Some(summary) = &details.summary {
            message.push_str(&format!("<b>Summary:</b> {}\n", escape_html(summary)));
        }
        self.send(&message).await;
    }

    pub async fn send_failure(&self, feature: &str, error: &str, details: &FailureDetails) {
        let mut message = format!(
            "<b>❌ FAILURE</b>\n<b>Feature:</b> {}\n<b>Time:</b> {}\n<b>Error:</b> {}\n",
            escape_html(feature),
            now(),
            escape_html(error)
        );
        if let Some(wallet) = &details.wallet {
            message.push_str(&format!("<b>Wallet:</b> <code>{}</code>\n", wallet));
        }
        if let (Some(attempt), Some(max)) = (details.attempt, details.max_retries) {
            message.push_str(&format!("<b>Attempt:</b> {}/{}\n", attempt, max));
        }
        self.send(&message).await;
    }

    pub async fn send_wallet_error(
        &self,
        wallet: &str,
        feature: &str,
        error: &str,
        balance: Option<f64>,
    ) {
        let mut message = format!(
            "<b>⚠️ WALLET ERROR</b>\n<b>Wallet:</b> <code>{}</code>\n<b>Feature:</b> {}\n<b>Time:</b> {}\n<b>Error:</b> {}\n",
            wallet,
            escape_html(feature),
            now(),
            escape_html(error)
        );
        if let Some(balance) = balance {
            message.push_str(&format!(
                "<b>Balance:</b> {:.6} {}\n",
                balance, self.native_symbol
            ));
        }
        self.send(&message).await;
    }

    pub async fn send_retry(&self, feature: &str, attempt: u32, max_retries: u32, error: &str) {
        let message = format!(
            "<b>🔄 RETRY ATTEMPT</b>\n\
             <b>Feature:</b> {}\n\
             <b>Attempt:</b> {}/{}\n\
             <b>Time:</b> {}\n\
             <b>Error:</b> {}\n",
            escape_html(feature),
            attempt,
            max_retries,
            now(),
            escape_html(error)
        );
        self.send(&message).await;
    }

    /// Summary of a cycle; `failures` holds (feature, error) pairs
    pub async fn send_cycle_summary(
        &self,
        cycle: u64,
        duration: Duration,
        failures: &[(String, String)],
    ) {
        let status = if failures.is_empty() {
            "✅ All Success"
        } else {
            "⚠️ Partial Success"
        };
        let mut message = format!(
            "<b>📊 CYCLE SUMMARY</b>\n\
             <b>Cycle:</b> #{}\n\
             <b>Duration:</b> {}ms\n\
             <b>Status:</b> {}\n\n",
            cycle,
            duration.as_millis(),
            status
        );
        if !failures.is_empty() {
            message.push_str("<b>Failed Features:</b>\n");
            for (feature, error) in failures {
                message.push_str(&format!(
                    "• {}: {}\n",
                    escape_html(feature),
                    escape_html(error)
                ));
            }
        }
        self.send(&message).await;
    }

    pub async fn send_periodic_report(&self, report: &PeriodicReport) {
        let mut message = format!(
            "<b>📊 PERIODIC REPORT</b>\n\
             <b>Date:</b> {}\n\
             <b>Total Runs:</b> {}\n\
             <b>Successful:</b> {}\n\
             <b>Failed:</b> {}\n\
             <b>Success Rate:</b> {:.2}%\n\
             <b>Uptime:</b> {}\n",
            chrono::Local::now().format("%Y-%m-%d"),
            report.total_runs,
            report.successful,
            report.failed,
            report.success_rate,
            report.uptime
        );
        if !report.features.is_empty() {
            message.push_str("\n<b>Feature Breakdown:</b>\n");
            for (feature, count) in &report.features {
                message.push_str(&format!("• {}: {}\n", escape_html(feature), count));
            }
        }
        self.send(&message).await;
    }

    pub async fn send_critical(&self, error: &str, backoff: Duration) {
        let message = format!(
            "<b>💥 CRITICAL ERROR</b>\n\
             <b>Time:</b> {}\n\
             <b>Error:</b> {}\n\
             <b>Status:</b> Restarting in {}...",
            now(),
            escape_html(error),
            crate::automation::cooldown::format_duration(backoff)
        );
        self.send(&message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> (Notifier, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Notifier::new(sink.clone(), "0G"), sink)
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
    }

    #[tokio::test]
    async fn test_failure_message_layout() {
        let (notifier, sink) = notifier();
        notifier
            .send_failure(
                "Token Swap",
                "boom <revert>",
                &FailureDetails {
                    wallet: Some("0xabc".into()),
                    attempt: Some(3),
                    max_retries: Some(3),
                },
            )
            .await;

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("<b>❌ FAILURE</b>"));
        assert!(messages[0].contains("boom &lt;revert&gt;"));
        assert!(messages[0].contains("<b>Attempt:</b> 3/3"));
        assert!(messages[0].contains("<code>0xabc</code>"));
    }

    #[tokio::test]
    async fn test_cycle_summary_lists_failures() {
        let (notifier, sink) = notifier();
        notifier
            .send_cycle_summary(
                7,
                Duration::from_millis(1500),
                &[("File Upload".into(), "no balance".into())],
            )
            .await;

        let message = &sink.messages()[0];
        assert!(message.contains("#7"));
        assert!(message.contains("1500ms"));
        assert!(message.contains("Partial Success"));
        assert!(message.contains("• File Upload: no balance"));
    }

    #[tokio::test]
    async fn test_shutdown_reasons() {
        let (notifier, sink) = notifier();
        notifier.send_shutdown(ShutdownReason::Manual).await;
        notifier.send_shutdown(ShutdownReason::System).await;
        let messages = sink.messages();
        assert!(messages[0].contains("Manual shutdown"));
        assert!(messages[1].contains("System shutdown"));
    }

    #[tokio::test]
    async fn test_critical_mentions_backoff() {
        let (notifier, sink) = notifier();
        notifier
            .send_critical("cycle panicked", Duration::from_secs(300))
            .await;
        assert!(sink.messages()[0].contains("Restarting in 5m"));
    }
}
