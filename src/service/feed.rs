use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use tokio::sync::watch;
use uuid::Uuid;

use crate::models::referralmodel::ReferralSummary;

#[derive(Debug)]
struct Channel {
    sender: watch::Sender<ReferralSummary>,
    /// Version of the snapshot currently held by `sender`.
    version: u64,
}

/// Live referral snapshots per user. A subscriber only ever holds the most
/// recent snapshot; intermediate ones may be skipped.
#[derive(Debug, Default)]
pub struct ReferralFeed {
    channels: Mutex<HashMap<Uuid, Channel>>,
    versions: AtomicU64,
}

impl ReferralFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the version for a snapshot that is about to be read. Take it
    /// after the mutation and before the read: a higher version then never
    /// carries older data than a lower one.
    pub fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn subscribe(&self, user_id: Uuid) -> watch::Receiver<ReferralSummary> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());

        // Sweep channels left behind by disconnected subscribers
        channels.retain(|id, channel| *id == user_id || channel.sender.receiver_count() > 0);

        match channels.get(&user_id) {
            Some(channel) => channel.sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(ReferralSummary::default());
                channels.insert(user_id, Channel { sender, version: 0 });
                receiver
            }
        }
    }

    /// Replaces the snapshot seen by `user_id`'s subscribers unless a newer
    /// version was already published. Channels whose subscribers have all
    /// gone away are dropped here.
    pub fn publish(&self, user_id: Uuid, version: u64, summary: ReferralSummary) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());

        let Some(channel) = channels.get_mut(&user_id) else {
            return;
        };

        if channel.sender.receiver_count() == 0 {
            channels.remove(&user_id);
            tracing::debug!("Dropped referral feed for {} (no subscribers)", user_id);
            return;
        }

        if version <= channel.version {
            tracing::debug!(
                "Skipped stale referral snapshot for {} (v{} <= v{})",
                user_id,
                version,
                channel.version
            );
            return;
        }

        channel.version = version;
        channel.sender.send_replace(summary);
    }

    /// Drops `user_id`'s channel if nobody is listening any more.
    pub fn prune(&self, user_id: Uuid) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());

        let unobserved = channels
            .get(&user_id)
            .is_some_and(|channel| channel.sender.receiver_count() == 0);
        if unobserved {
            channels.remove(&user_id);
            tracing::debug!("Dropped referral feed for {} (no subscribers)", user_id);
        }
    }

    pub fn subscriber_count(&self, user_id: Uuid) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .get(&user_id)
            .map(|channel| channel.sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::referralmodel::Referral;

    fn summary_with(count: usize) -> ReferralSummary {
        let referrer = Uuid::new_v4();
        ReferralSummary::from_records(
            (0..count)
                .map(|i| Referral::pending(referrer, format!("user{}@example.com", i)))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_subscriber_sees_latest_snapshot() {
        let feed = ReferralFeed::new();
        let user_id = Uuid::new_v4();
        let mut receiver = feed.subscribe(user_id);

        feed.publish(user_id, feed.next_version(), summary_with(1));
        feed.publish(user_id, feed.next_version(), summary_with(3));

        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update().referrals.len(), 3);
    }

    #[test]
    fn test_older_snapshot_never_replaces_newer() {
        let feed = ReferralFeed::new();
        let user_id = Uuid::new_v4();
        let receiver = feed.subscribe(user_id);

        let older = feed.next_version();
        let newer = feed.next_version();
        feed.publish(user_id, newer, summary_with(2));
        feed.publish(user_id, older, summary_with(1));

        assert_eq!(receiver.borrow().referrals.len(), 2);
    }

    #[test]
    fn test_publish_without_subscribers_is_a_noop() {
        let feed = ReferralFeed::new();
        let user_id = Uuid::new_v4();

        feed.publish(user_id, feed.next_version(), summary_with(1));
        assert_eq!(feed.subscriber_count(user_id), 0);
        assert_eq!(feed.channel_count(), 0);
    }

    #[test]
    fn test_channel_dropped_after_last_subscriber_leaves() {
        let feed = ReferralFeed::new();
        let user_id = Uuid::new_v4();

        let first = feed.subscribe(user_id);
        let second = feed.subscribe(user_id);
        assert_eq!(feed.subscriber_count(user_id), 2);

        drop(first);
        drop(second);
        feed.publish(user_id, feed.next_version(), summary_with(1));

        assert_eq!(feed.channel_count(), 0);
    }

    #[test]
    fn test_prune_keeps_observed_channels() {
        let feed = ReferralFeed::new();
        let watched = Uuid::new_v4();
        let abandoned = Uuid::new_v4();

        let _receiver = feed.subscribe(watched);
        drop(feed.subscribe(abandoned));

        feed.prune(watched);
        feed.prune(abandoned);

        assert_eq!(feed.channel_count(), 1);
        assert_eq!(feed.subscriber_count(watched), 1);
    }

    #[test]
    fn test_subscribe_sweeps_abandoned_channels() {
        let feed = ReferralFeed::new();
        for _ in 0..5 {
            drop(feed.subscribe(Uuid::new_v4()));
        }

        let _receiver = feed.subscribe(Uuid::new_v4());
        assert_eq!(feed.channel_count(), 1);
    }
}
