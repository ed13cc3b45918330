use crate::domain::ports::SnapshotStore;
use crate::domain::receipt::PaymentReceipt;
use crate::domain::user::User;
use crate::domain::withdrawal::WithdrawalRequest;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A snapshot store that keeps the serialized collections in memory.
///
/// Useful for tests and for running the engine without a data directory;
/// "saved" state is inspectable through the load methods.
#[derive(Default, Clone)]
pub struct InMemorySnapshots {
    users: Arc<RwLock<Vec<User>>>,
    withdrawals: Arc<RwLock<Vec<WithdrawalRequest>>>,
    receipts: Arc<RwLock<Vec<PaymentReceipt>>>,
}

impl InMemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshots {
    async fn save_users(&self, users: &[User]) -> Result<()> {
        *self.users.write().await = users.to_vec();
        Ok(())
    }

    async fn load_users(&self) -> Result<Vec<User>> {
        Ok(self.users.read().await.clone())
    }

    async fn save_withdrawals(&self, withdrawals: &[WithdrawalRequest]) -> Result<()> {
        *self.withdrawals.write().await = withdrawals.to_vec();
        Ok(())
    }

    async fn load_withdrawals(&self) -> Result<Vec<WithdrawalRequest>> {
        Ok(self.withdrawals.read().await.clone())
    }

    async fn save_receipts(&self, receipts: &[PaymentReceipt]) -> Result<()> {
        *self.receipts.write().await = receipts.to_vec();
        Ok(())
    }

    async fn load_receipts(&self) -> Result<Vec<PaymentReceipt>> {
        Ok(self.receipts.read().await.clone())
    }
}
