use crate::domain::user::User;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum amount a user may request to withdraw.
pub const MIN_WITHDRAWAL: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A user's request to pay out part of their balance.
///
/// Created pending, transitions exactly once to approved or rejected by
/// admin action, and is never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub amount: Decimal,
    pub wallet_address: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    /// Set only on the transition out of pending.
    pub processed_at: Option<DateTime<Utc>>,
}

impl WithdrawalRequest {
    pub fn new(user: &User, amount: Decimal, wallet_address: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user.id,
            username: user.username.clone(),
            amount,
            wallet_address,
            status: WithdrawalStatus::Pending,
            created_at: now,
            processed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == WithdrawalStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_request_is_pending() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let user = User::new(
            Uuid::new_v4(),
            "10000000001".to_string(),
            "alice".to_string(),
            "hash".to_string(),
            now,
        );
        let request = WithdrawalRequest::new(&user, dec!(150), "bc1qexample".to_string(), now);

        assert!(request.is_pending());
        assert_eq!(request.user_id, user.id);
        assert_eq!(request.username, "alice");
        assert!(request.processed_at.is_none());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&WithdrawalStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let back: WithdrawalStatus = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(back, WithdrawalStatus::Approved);
    }
}
