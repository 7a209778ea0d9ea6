use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "referral_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Completed,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub email: String,
    pub date: DateTime<Utc>,
    pub status: ReferralStatus,
    pub points: i64,

    #[serde(rename = "subscriptionId", skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,

    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Referral {
    pub fn pending(referrer_id: Uuid, email: String) -> Self {
        Referral {
            id: Uuid::new_v4(),
            referrer_id,
            email,
            date: Utc::now(),
            status: ReferralStatus::Pending,
            points: 0,
            subscription_id: None,
            completed_at: None,
        }
    }
}

/// Which pending record a completion settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingSelector {
    /// Exactly this record.
    Id(Uuid),
    /// The oldest pending record by `date`, ties broken by `id`.
    Oldest,
}

impl From<Option<Uuid>> for PendingSelector {
    fn from(id: Option<Uuid>) -> Self {
        id.map(PendingSelector::Id).unwrap_or(PendingSelector::Oldest)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ReferralSummary {
    pub referrals: Vec<Referral>,
    #[serde(rename = "totalPoints")]
    pub total_points: i64,
}

impl ReferralSummary {
    /// Newest first, with the points of every record summed.
    pub fn from_records(mut referrals: Vec<Referral>) -> Self {
        referrals.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        let total_points = referrals.iter().map(|r| r.points).sum();

        ReferralSummary {
            referrals,
            total_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_summary_sorts_newest_first_and_sums_points() {
        let referrer = Uuid::new_v4();
        let mut older = Referral::pending(referrer, "old@example.com".to_string());
        older.date = Utc::now() - Duration::days(2);
        older.points = 2;
        older.status = ReferralStatus::Completed;
        let newer = Referral::pending(referrer, "new@example.com".to_string());

        let summary = ReferralSummary::from_records(vec![older.clone(), newer.clone()]);

        assert_eq!(summary.referrals[0].email, "new@example.com");
        assert_eq!(summary.referrals[1].email, "old@example.com");
        assert_eq!(summary.total_points, 2);
    }

    #[test]
    fn test_selector_from_option() {
        let id = Uuid::new_v4();
        assert_eq!(PendingSelector::from(Some(id)), PendingSelector::Id(id));
        assert_eq!(PendingSelector::from(None), PendingSelector::Oldest);
    }
}
