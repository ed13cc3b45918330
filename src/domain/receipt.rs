use crate::domain::user::User;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Pending,
    Approved,
    Rejected,
}

/// Reference to an uploaded file, as handed over by the upload collaborator.
/// Both fields are opaque to the core; file bytes never enter it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub file_id: String,
    pub original_name: String,
}

/// A payment proof uploaded by a user, awaiting admin review.
///
/// Terminal once reviewed; approval side-effects the owning user's
/// `has_paid` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub amount: Decimal,
    pub description: String,
    pub file: StoredFile,
    pub status: ReceiptStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl PaymentReceipt {
    pub fn new(
        user: &User,
        amount: Decimal,
        description: Option<String>,
        file: StoredFile,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user.id,
            username: user.username.clone(),
            amount,
            description: description.unwrap_or_else(|| "payment receipt".to_string()),
            file,
            status: ReceiptStatus::Pending,
            created_at: now,
            reviewed_by: None,
            reviewed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReceiptStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_receipt_defaults() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let user = User::new(
            Uuid::new_v4(),
            "10000000001".to_string(),
            "bob".to_string(),
            "hash".to_string(),
            now,
        );
        let receipt = PaymentReceipt::new(
            &user,
            dec!(189),
            None,
            StoredFile {
                file_id: "receiptFile-1754000000-42.png".to_string(),
                original_name: "proof.png".to_string(),
            },
            now,
        );

        assert!(receipt.is_pending());
        assert_eq!(receipt.description, "payment receipt");
        assert!(receipt.reviewed_by.is_none());
        assert!(receipt.reviewed_at.is_none());
    }
}
