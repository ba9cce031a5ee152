//! Refresh notifications
//!
//! Views that display engine output subscribe to the data domain they show
//! and are told when it changes, instead of polling shared refresh flags.
//!
//! Each domain has a bounded broadcast channel. A subscriber that falls
//! behind sees `Lagged` and skips the oldest events; refresh signals are
//! idempotent so only the latest one matters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Events buffered per domain for a subscriber that has not read yet
pub const REFRESH_CHANNEL_CAPACITY: usize = 16;

/// Data domain whose views need refreshing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshDomain {
    /// Calendar sessions
    Training,
    /// Fitness-test results
    FormScan,
    /// Activity index and its series
    ActivityScore,
}

/// Notification delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshEvent {
    pub domain: RefreshDomain,
    pub at: DateTime<Utc>,
}

/// Per-domain publish/subscribe hub
#[derive(Debug)]
pub struct RefreshHub {
    training: broadcast::Sender<RefreshEvent>,
    form_scan: broadcast::Sender<RefreshEvent>,
    activity_score: broadcast::Sender<RefreshEvent>,
}

impl Default for RefreshHub {
    fn default() -> Self {
        Self {
            training: broadcast::channel(REFRESH_CHANNEL_CAPACITY).0,
            form_scan: broadcast::channel(REFRESH_CHANNEL_CAPACITY).0,
            activity_score: broadcast::channel(REFRESH_CHANNEL_CAPACITY).0,
        }
    }
}

impl RefreshHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every future event of `domain`
    pub fn subscribe(&self, domain: RefreshDomain) -> broadcast::Receiver<RefreshEvent> {
        self.sender(domain).subscribe()
    }

    /// Notify subscribers of `domain`; returns how many were reached
    pub fn publish(&self, domain: RefreshDomain, at: DateTime<Utc>) -> usize {
        // Sending fails only when nobody is subscribed.
        let delivered = self
            .sender(domain)
            .send(RefreshEvent { domain, at })
            .unwrap_or(0);
        debug!(?domain, delivered, "published refresh");
        delivered
    }

    pub fn subscriber_count(&self, domain: RefreshDomain) -> usize {
        self.sender(domain).receiver_count()
    }

    fn sender(&self, domain: RefreshDomain) -> &broadcast::Sender<RefreshEvent> {
        match domain {
            RefreshDomain::Training => &self.training,
            RefreshDomain::FormScan => &self.form_scan,
            RefreshDomain::ActivityScore => &self.activity_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::sync::broadcast::error::TryRecvError;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_events_scoped_to_domain() {
        let hub = RefreshHub::new();
        let mut training = hub.subscribe(RefreshDomain::Training);
        let mut score = hub.subscribe(RefreshDomain::ActivityScore);

        assert_eq!(hub.publish(RefreshDomain::Training, at()), 1);

        let event = training.try_recv().unwrap();
        assert_eq!(event.domain, RefreshDomain::Training);
        assert_eq!(event.at, at());
        assert!(matches!(score.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = RefreshHub::new();
        assert_eq!(hub.publish(RefreshDomain::FormScan, at()), 0);
    }

    #[test]
    fn test_dropped_subscribers_not_counted() {
        let hub = RefreshHub::new();
        let mut kept = hub.subscribe(RefreshDomain::FormScan);
        drop(hub.subscribe(RefreshDomain::FormScan));
        assert_eq!(hub.subscriber_count(RefreshDomain::FormScan), 1);

        assert_eq!(hub.publish(RefreshDomain::FormScan, at()), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_idle_subscriber_queue_is_bounded() {
        let hub = RefreshHub::new();
        let mut idle = hub.subscribe(RefreshDomain::ActivityScore);

        for _ in 0..10_000 {
            hub.publish(RefreshDomain::ActivityScore, at());
        }

        assert!(matches!(idle.try_recv(), Err(TryRecvError::Lagged(_))));
        let mut buffered = 0;
        while idle.try_recv().is_ok() {
            buffered += 1;
        }
        assert_eq!(buffered, REFRESH_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_publish_across_threads() {
        let hub = std::sync::Arc::new(RefreshHub::new());
        let mut rx = hub.subscribe(RefreshDomain::ActivityScore);

        let publisher = {
            let hub = hub.clone();
            std::thread::spawn(move || hub.publish(RefreshDomain::ActivityScore, at()))
        };
        assert_eq!(publisher.join().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap().domain, RefreshDomain::ActivityScore);
    }
}
