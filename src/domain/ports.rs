use super::receipt::PaymentReceipt;
use super::user::User;
use super::withdrawal::WithdrawalRequest;
use crate::error::Result;
use async_trait::async_trait;

/// Durable snapshot storage for the three ledger collections.
///
/// Saves are all-or-nothing per collection; loads are tolerant (a bad record
/// or a corrupt file must never take the process down). Implementations log
/// what they skip or quarantine.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save_users(&self, users: &[User]) -> Result<()>;
    async fn load_users(&self) -> Result<Vec<User>>;

    async fn save_withdrawals(&self, withdrawals: &[WithdrawalRequest]) -> Result<()>;
    async fn load_withdrawals(&self) -> Result<Vec<WithdrawalRequest>>;

    async fn save_receipts(&self, receipts: &[PaymentReceipt]) -> Result<()>;
    async fn load_receipts(&self) -> Result<Vec<PaymentReceipt>>;
}

pub type SnapshotStoreBox = Box<dyn SnapshotStore>;
