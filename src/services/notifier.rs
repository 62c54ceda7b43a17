// src/services/notifier.rs

//! Notifier adapter: message rendering and delivery with retries.

use std::time::Duration;

use crate::models::{MessageFormat, NotifierConfig, Record};
use crate::services::transport::{Transport, TransportError};
use crate::utils::retry::{RetryPolicy, pace};
use crate::utils::text::truncate_chars;

/// Longest message the chat endpoint accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Template used when the simple format has no configured template.
pub const DEFAULT_TEMPLATE: &str =
    "✈️ {origin} → {destination} — {price}\nTarihler: {dates}\nKaynak: {url}";

const MISSING: &str = "belirtilmemiş";

/// Renders records into message text.
#[derive(Debug, Clone, Default)]
pub struct MessageFormatter {
    format: MessageFormat,
    template: Option<String>,
}

impl MessageFormatter {
    pub fn new(format: MessageFormat, template: Option<String>) -> Self {
        Self { format, template }
    }

    /// Message text for a record, capped at [`MAX_MESSAGE_CHARS`].
    pub fn render(&self, record: &Record) -> String {
        let text = match self.format {
            MessageFormat::Block => render_block(record),
            MessageFormat::Template => {
                render_template(self.template.as_deref().unwrap_or(DEFAULT_TEMPLATE), record)
            }
        };
        truncate_chars(&text, MAX_MESSAGE_CHARS).to_string()
    }
}

fn place(name: &str) -> &str {
    if name.is_empty() { "?" } else { name }
}

fn price_display(record: &Record) -> Option<String> {
    if !record.price_text.is_empty() {
        Some(record.price_text.clone())
    } else if record.has_price() {
        Some(format!("{} TL", record.price))
    } else {
        None
    }
}

/// Fixed multi-line layout.
fn render_block(record: &Record) -> String {
    let mut lines = vec![format!(
        "✈️ {} → {}",
        place(&record.origin),
        place(&record.destination)
    )];

    lines.push(format!(
        "💰 Fiyat: {}",
        price_display(record).unwrap_or_else(|| MISSING.to_string())
    ));

    let dates = record.date_labels();
    if dates.is_empty() {
        lines.push(format!("📅 Tarihler: {MISSING}"));
    } else {
        lines.push("📅 Tarihler:".to_string());
        lines.extend(dates.iter().map(|d| format!("• {d}")));
    }

    if let Some(operator) = record.extra.get("operator") {
        lines.push(format!("🛫 Havayolu: {operator}"));
    }
    if let Some(posted) = record.extra.get("posted") {
        lines.push(format!("🕒 Paylaşım: {posted}"));
    }
    lines.push(format!("🔗 Kaynak: {}", record.url));
    lines.join("\n")
}

/// Simple layout from a template with named placeholders.
fn render_template(template: &str, record: &Record) -> String {
    let dates = record.date_labels();
    let dates = if dates.is_empty() {
        "—".to_string()
    } else {
        dates.join(", ")
    };
    let price = if record.price_text.is_empty() {
        record.price.to_string()
    } else {
        record.price_text.clone()
    };

    template
        .replace("{origin}", &record.origin)
        .replace("{destination}", &record.destination)
        .replace("{price}", &price)
        .replace("{dates}", &dates)
        .replace("{url}", &record.url)
}

/// Result of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered { attempts: u32 },
    Failed { reason: String },
}

impl NotifyOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, NotifyOutcome::Delivered { .. })
    }
}

/// Formats records and delivers them through a transport.
pub struct Notifier {
    transport: Box<dyn Transport>,
    formatter: MessageFormatter,
    policy: RetryPolicy,
    max_rate_limit_retries: u32,
    max_backoff: Duration,
    delay_min_ms: u64,
    delay_max_ms: u64,
}

impl Notifier {
    pub fn new(
        transport: Box<dyn Transport>,
        config: &NotifierConfig,
        template: Option<String>,
    ) -> Self {
        Self {
            transport,
            formatter: MessageFormatter::new(config.format, template),
            policy: config.retry_policy(),
            max_rate_limit_retries: config.max_rate_limit_retries,
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            delay_min_ms: config.delay_min_ms,
            delay_max_ms: config.delay_max_ms,
        }
    }

    /// Override the transient-failure backoff.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the random pause before each send.
    pub fn with_pacing(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.delay_min_ms = min_ms;
        self.delay_max_ms = max_ms;
        self
    }

    pub fn render(&self, record: &Record) -> String {
        self.formatter.render(record)
    }

    /// Wait before retrying a rate-limited send: the server hint capped at
    /// `max_backoff`, or the backoff policy when no hint was given.
    fn rate_limit_wait(&self, hint: Option<Duration>, retries: u32) -> Duration {
        hint.map(|hint| hint.min(self.max_backoff))
            .unwrap_or_else(|| self.policy.delay_for(retries))
    }

    /// Render and deliver one record. Never fails; the outcome says how it went.
    pub async fn notify(&self, record: &Record) -> NotifyOutcome {
        let text = self.render(record);
        self.send_text(&text).await
    }

    /// Deliver text, backing off on rate limits and transient failures.
    pub async fn send_text(&self, text: &str) -> NotifyOutcome {
        let mut attempts = 0;
        let mut transient_failures = 0;
        let mut rate_limited = 0;

        loop {
            pace(self.delay_min_ms, self.delay_max_ms).await;
            attempts += 1;

            let wait = match self.transport.send(text).await {
                Ok(()) => return NotifyOutcome::Delivered { attempts },
                Err(TransportError::RateLimited { retry_after }) => {
                    rate_limited += 1;
                    if rate_limited > self.max_rate_limit_retries {
                        return NotifyOutcome::Failed {
                            reason: format!("still rate limited after {rate_limited} tries"),
                        };
                    }
                    let wait = self.rate_limit_wait(retry_after, rate_limited);
                    log::warn!("Rate limited; waiting {:?} before retry", wait);
                    wait
                }
                Err(TransportError::Transient(message)) => {
                    transient_failures += 1;
                    if transient_failures >= self.policy.max_attempts {
                        return NotifyOutcome::Failed { reason: message };
                    }
                    let wait = self.policy.delay_for(transient_failures);
                    log::warn!(
                        "Send failed (attempt {}/{}): {}; retrying in {:?}",
                        transient_failures,
                        self.policy.max_attempts,
                        message,
                        wait
                    );
                    wait
                }
                Err(TransportError::Rejected(message)) => {
                    return NotifyOutcome::Failed { reason: message };
                }
            };

            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{DateRange, Price, Route};
    use crate::utils::retry::Backoff;

    /// Replays scripted replies and records every text it was given.
    #[derive(Clone, Default)]
    struct Scripted {
        replies: Arc<Mutex<VecDeque<Result<(), TransportError>>>>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<(), TransportError>>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                sent: Arc::default(),
            }
        }

        fn sent(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, text: &str) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(text.to_string());
            self.replies.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    fn record() -> Record {
        let mut record = Record::new("https://ucuzaucak.net/ilan/istanbul-tokyo/")
            .with_route(Route::new("İstanbul", "Tokyo"))
            .with_price(Some(Price {
                amount: 19920,
                text: "19.920 TL".into(),
            }));
        let day = NaiveDate::from_ymd_opt(2025, 11, 24).unwrap();
        record.date_ranges = vec![DateRange {
            start: day,
            end: day + chrono::Days::new(7),
            days: 7,
            label: "24 Kasım – 01 Aralık (7 Gün)".into(),
        }];
        record
    }

    fn quiet_config() -> NotifierConfig {
        NotifierConfig {
            max_backoff_secs: 0,
            ..NotifierConfig::default()
        }
    }

    fn notifier(transport: Scripted) -> Notifier {
        Notifier::new(Box::new(transport), &quiet_config(), None)
            .with_policy(RetryPolicy::immediate(3))
            .with_pacing(0, 0)
    }

    #[test]
    fn test_block_layout() {
        let mut rec = record();
        rec.extra.insert("operator".into(), "Pegasus".into());
        let text = MessageFormatter::default().render(&rec);
        assert_eq!(
            text,
            "✈️ İstanbul → Tokyo\n\
             💰 Fiyat: 19.920 TL\n\
             📅 Tarihler:\n\
             • 24 Kasım – 01 Aralık (7 Gün)\n\
             🛫 Havayolu: Pegasus\n\
             🔗 Kaynak: https://ucuzaucak.net/ilan/istanbul-tokyo/"
        );
    }

    #[test]
    fn test_block_placeholders_for_missing_fields() {
        let rec = Record::new("https://ucuzaucak.net/ilan/x/");
        let text = MessageFormatter::default().render(&rec);
        assert!(text.starts_with("✈️ ? → ?"));
        assert!(text.contains("Fiyat: belirtilmemiş"));
        assert!(text.contains("Tarihler: belirtilmemiş"));
        assert!(!text.contains("Havayolu"));
    }

    #[test]
    fn test_default_template() {
        let formatter = MessageFormatter::new(MessageFormat::Template, None);
        assert_eq!(
            formatter.render(&record()),
            "✈️ İstanbul → Tokyo — 19.920 TL\n\
             Tarihler: 24 Kasım – 01 Aralık (7 Gün)\n\
             Kaynak: https://ucuzaucak.net/ilan/istanbul-tokyo/"
        );
    }

    #[test]
    fn test_custom_template_and_empty_dates() {
        let formatter = MessageFormatter::new(
            MessageFormat::Template,
            Some("{origin}-{destination} {price} [{dates}]".into()),
        );
        let rec = Record::new("u").with_route(Route::new("A", "B"));
        assert_eq!(formatter.render(&rec), "A-B 0 [—]");
    }

    #[test]
    fn test_long_messages_are_truncated() {
        let mut rec = record();
        rec.url = "ü".repeat(5000);
        let text = MessageFormatter::default().render(&rec);
        assert_eq!(text.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[tokio::test]
    async fn test_delivers_first_try() {
        let transport = Scripted::new(vec![]);
        let outcome = notifier(transport.clone()).notify(&record()).await;
        assert_eq!(outcome, NotifyOutcome::Delivered { attempts: 1 });
        assert_eq!(transport.sent(), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let transport = Scripted::new(vec![
            Err(TransportError::Transient("timeout".into())),
            Err(TransportError::Transient("502".into())),
        ]);
        let outcome = notifier(transport.clone()).notify(&record()).await;
        assert_eq!(outcome, NotifyOutcome::Delivered { attempts: 3 });
    }

    #[tokio::test]
    async fn test_gives_up_after_transient_budget() {
        let transport = Scripted::new(vec![Err(TransportError::Transient("down".into())); 5]);
        let outcome = notifier(transport.clone()).notify(&record()).await;
        assert!(!outcome.is_delivered());
        assert_eq!(transport.sent(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_honors_hint_and_has_own_budget() {
        let limited = Err(TransportError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        });
        let transport = Scripted::new(vec![
            limited.clone(),
            limited.clone(),
            limited.clone(),
            limited,
        ]);
        // Hint is capped at max_backoff (0s here), so no real sleep happens.
        let outcome = notifier(transport.clone()).notify(&record()).await;
        assert_eq!(outcome, NotifyOutcome::Delivered { attempts: 5 });
    }

    #[test]
    fn test_rate_limit_wait_caps_hint_and_falls_back_to_backoff() {
        let config = NotifierConfig {
            max_backoff_secs: 60,
            ..NotifierConfig::default()
        };
        let notifier = Notifier::new(Box::new(Scripted::new(vec![])), &config, None).with_policy(
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(60),
                jitter: Duration::ZERO,
                backoff: Backoff::Exponential,
            },
        );

        let hint = Some(Duration::from_secs(7));
        assert_eq!(notifier.rate_limit_wait(hint, 1), Duration::from_secs(7));
        let hint = Some(Duration::from_secs(600));
        assert_eq!(notifier.rate_limit_wait(hint, 1), Duration::from_secs(60));
        assert_eq!(notifier.rate_limit_wait(None, 3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_rate_limit_budget_exhausted() {
        let limited = Err(TransportError::RateLimited { retry_after: None });
        let transport = Scripted::new(vec![limited; 10]);
        let outcome = notifier(transport.clone()).notify(&record()).await;
        assert!(!outcome.is_delivered());
        // one initial try plus five rate-limit retries
        assert_eq!(transport.sent(), 6);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let transport = Scripted::new(vec![Err(TransportError::Rejected("chat not found".into()))]);
        let outcome = notifier(transport.clone()).notify(&record()).await;
        assert_eq!(
            outcome,
            NotifyOutcome::Failed {
                reason: "chat not found".into()
            }
        );
        assert_eq!(transport.sent(), 1);
    }
}
