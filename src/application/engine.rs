use crate::domain::ledger::Ledger;
use crate::domain::money::Amount;
use crate::domain::ports::SnapshotStoreBox;
use crate::domain::receipt::{PaymentReceipt, ReceiptStatus, StoredFile};
use crate::domain::reward::next_reward_preview;
use crate::domain::task::TaskInstance;
use crate::domain::user::{
    OrderKind, User, UserView, generate_user_number, is_valid_user_number,
};
use crate::domain::withdrawal::{MIN_WITHDRAWAL, WithdrawalRequest, WithdrawalStatus};
use crate::error::{LedgerError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tokio::sync::{Mutex, broadcast};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Admin verdict on a pending withdrawal request or payment receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Broadcast payload emitted after any successful mutation that changes a
/// user's tasks or balance. Collaborators fan this out to every listener,
/// not just the owner.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub user_id: Uuid,
    pub user: UserView,
    pub new_completions: Vec<TaskInstance>,
}

/// Outcome handed back for a successful order submission.
#[derive(Debug, Clone)]
pub struct OrderResult {
    pub user: UserView,
    /// Balance delta granted by a task completion; zero when none completed.
    pub reward: Decimal,
    pub new_completions: Vec<TaskInstance>,
    /// Cosmetic preview from the reward calculator. Never applied to the
    /// balance.
    pub next_reward: Decimal,
}

/// The mutation coordinator: the boundary the routing/auth, upload, and
/// broadcast collaborators attach to.
///
/// Accepts validated intents, runs the task engine against the ledger,
/// asks the snapshot store to persist the affected collections, and emits
/// update events, as one logical unit per intent. All mutating intents
/// serialize on a single ledger mutex: every intent runs its whole
/// read-decide-write-persist span without interleaving.
///
/// Snapshot writes are best-effort durability: a failed save is logged and
/// the intent still reports success for the applied in-memory change.
pub struct LedgerEngine {
    ledger: Mutex<Ledger>,
    snapshots: SnapshotStoreBox,
    updates: broadcast::Sender<UserUpdate>,
}

fn unknown_user() -> LedgerError {
    LedgerError::Validation("unknown user".to_string())
}

impl LedgerEngine {
    /// Loads all three collections from the snapshot store, backfills any
    /// historical user record missing a valid user number, and re-saves the
    /// users collection if repairs were made.
    pub async fn bootstrap(snapshots: SnapshotStoreBox) -> Result<Self> {
        let users = snapshots.load_users().await?;
        let withdrawals = snapshots.load_withdrawals().await?;
        let receipts = snapshots.load_receipts().await?;
        info!(
            users = users.len(),
            withdrawals = withdrawals.len(),
            receipts = receipts.len(),
            "ledger loaded"
        );

        let mut ledger = Ledger::new(users, withdrawals, receipts);
        let mut taken: HashSet<String> = ledger
            .users()
            .filter(|user| is_valid_user_number(&user.user_number))
            .map(|user| user.user_number.clone())
            .collect();
        let mut repaired = 0usize;
        for user in ledger.users_mut() {
            if !is_valid_user_number(&user.user_number) {
                let number = generate_user_number(|candidate| taken.contains(candidate));
                taken.insert(number.clone());
                user.user_number = number;
                repaired += 1;
            }
        }

        let engine = Self {
            ledger: Mutex::new(ledger),
            snapshots,
            updates: broadcast::channel(64).0,
        };
        if repaired > 0 {
            warn!(repaired, "backfilled user numbers on historical records");
            let ledger = engine.ledger.lock().await;
            engine.persist_users(&ledger).await;
        }
        Ok(engine)
    }

    /// Receiver for user update events.
    pub fn subscribe(&self) -> broadcast::Receiver<UserUpdate> {
        self.updates.subscribe()
    }

    pub async fn register(&self, username: &str, password_hash: &str) -> Result<UserView> {
        let username = username.trim();
        if username.len() < 3 {
            return Err(LedgerError::Validation(
                "username must be at least 3 characters".to_string(),
            ));
        }
        if password_hash.is_empty() {
            return Err(LedgerError::Validation(
                "password hash required".to_string(),
            ));
        }

        let mut ledger = self.ledger.lock().await;
        if ledger.user_by_username(username).is_some() {
            return Err(LedgerError::BusinessRule(
                "username is already taken".to_string(),
            ));
        }
        let number = generate_user_number(|candidate| ledger.user_number_taken(candidate));
        let user = User::new(
            Uuid::new_v4(),
            number,
            username.to_string(),
            password_hash.to_string(),
            Utc::now(),
        );
        let view = user.view();
        info!(username, user_number = %view.user_number, "user registered");
        ledger.insert_user(user);
        self.persist_users(&ledger).await;
        Ok(view)
    }

    pub async fn record_login(&self, user_id: Uuid) -> Result<UserView> {
        let mut ledger = self.ledger.lock().await;
        let user = ledger.user_mut(user_id).ok_or_else(unknown_user)?;
        user.last_login = Utc::now();
        let view = user.view();
        self.persist_users(&ledger).await;
        Ok(view)
    }

    /// Runs one order action through the task engine. The payment gate is
    /// enforced at completion time inside `User::record_order`; a gated
    /// rejection leaves the user untouched.
    pub async fn submit_order(&self, user_id: Uuid, kind: OrderKind) -> Result<OrderResult> {
        let mut ledger = self.ledger.lock().await;
        let user = ledger.user_mut(user_id).ok_or_else(unknown_user)?;
        if user.quota.is_zero() {
            return Err(LedgerError::BusinessRule(
                "no quota has been assigned yet".to_string(),
            ));
        }

        let outcome = user.record_order(kind, Utc::now())?;
        if let Some(completed) = outcome.new_completions.first() {
            info!(
                username = %user.username,
                task = completed.id,
                reward = %outcome.reward.normalize(),
                "task completed"
            );
        }
        let view = user.view();
        self.persist_users(&ledger).await;
        let _ = self.updates.send(UserUpdate {
            user_id,
            user: view.clone(),
            new_completions: outcome.new_completions.clone(),
        });
        Ok(OrderResult {
            next_reward: next_reward_preview(view.balance),
            user: view,
            reward: outcome.reward,
            new_completions: outcome.new_completions,
        })
    }

    /// Balance check and request append are one atomic unit under the
    /// ledger lock; two concurrent requests cannot both pass the check
    /// against the same balance.
    pub async fn request_withdrawal(
        &self,
        user_id: Uuid,
        amount: Amount,
        wallet_address: &str,
    ) -> Result<WithdrawalRequest> {
        if wallet_address.trim().is_empty() {
            return Err(LedgerError::Validation(
                "wallet address required".to_string(),
            ));
        }

        let mut ledger = self.ledger.lock().await;
        let user = ledger.user(user_id).ok_or_else(unknown_user)?;
        let amount = amount.value();
        if amount < MIN_WITHDRAWAL {
            return Err(LedgerError::BusinessRule(format!(
                "minimum withdrawal amount is {MIN_WITHDRAWAL}"
            )));
        }
        if amount > user.balance {
            return Err(LedgerError::BusinessRule(
                "insufficient balance".to_string(),
            ));
        }
        if !user.all_tasks_completed() {
            return Err(LedgerError::BusinessRule(format!(
                "all tasks must be completed before withdrawing ({}/{} completed)",
                user.completed_task_count(),
                user.tasks.len()
            )));
        }

        let request = WithdrawalRequest::new(user, amount, wallet_address.to_string(), Utc::now());
        info!(username = %request.username, amount = %amount.normalize(), "withdrawal requested");
        ledger.push_withdrawal(request.clone());
        self.persist_withdrawals(&ledger).await;
        Ok(request)
    }

    pub async fn submit_receipt(
        &self,
        user_id: Uuid,
        amount: Amount,
        description: Option<String>,
        file: StoredFile,
    ) -> Result<PaymentReceipt> {
        let mut ledger = self.ledger.lock().await;
        let user = ledger.user(user_id).ok_or_else(unknown_user)?;
        let receipt = PaymentReceipt::new(user, amount.value(), description, file, Utc::now());
        info!(
            username = %receipt.username,
            amount = %receipt.amount.normalize(),
            file = %receipt.file.file_id,
            "payment receipt submitted"
        );
        ledger.insert_receipt(receipt.clone());
        self.persist_receipts(&ledger).await;
        Ok(receipt)
    }

    /// Assigns or updates a user's quota. The first assignment materializes
    /// the task set; later assignments never regenerate tasks or recompute
    /// their frozen payment requirements.
    pub async fn set_quota(&self, user_id: Uuid, quota: Amount) -> Result<UserView> {
        let mut ledger = self.ledger.lock().await;
        let user = ledger.user_mut(user_id).ok_or_else(unknown_user)?;
        let generated = user.assign_quota(quota.value());
        if generated {
            info!(
                username = %user.username,
                quota = %user.quota.normalize(),
                tasks = user.tasks.len(),
                "quota assigned and task set generated"
            );
        } else {
            info!(
                username = %user.username,
                quota = %user.quota.normalize(),
                "quota updated; existing tasks kept"
            );
        }
        let view = user.view();
        self.persist_users(&ledger).await;
        if generated {
            let _ = self.updates.send(UserUpdate {
                user_id,
                user: view.clone(),
                new_completions: Vec::new(),
            });
        }
        Ok(view)
    }

    /// Credits the balance directly. Task progress is not re-evaluated
    /// here; balance-type tasks pick the new balance up on the user's next
    /// order.
    pub async fn add_balance(&self, user_id: Uuid, amount: Amount) -> Result<UserView> {
        let mut ledger = self.ledger.lock().await;
        let user = ledger.user_mut(user_id).ok_or_else(unknown_user)?;
        user.balance += amount.value();
        info!(username = %user.username, balance = %user.balance.normalize(), "balance credited");
        let view = user.view();
        self.persist_users(&ledger).await;
        let _ = self.updates.send(UserUpdate {
            user_id,
            user: view.clone(),
            new_completions: Vec::new(),
        });
        Ok(view)
    }

    pub async fn mark_paid(&self, user_id: Uuid) -> Result<UserView> {
        let mut ledger = self.ledger.lock().await;
        let user = ledger.user_mut(user_id).ok_or_else(unknown_user)?;
        user.has_paid = true;
        info!(username = %user.username, "user marked as paid");
        let view = user.view();
        self.persist_users(&ledger).await;
        Ok(view)
    }

    pub async fn review_withdrawal(
        &self,
        request_id: Uuid,
        decision: ReviewDecision,
    ) -> Result<WithdrawalRequest> {
        let mut ledger = self.ledger.lock().await;
        let request = ledger
            .withdrawal_mut(request_id)
            .ok_or_else(|| LedgerError::Validation("unknown withdrawal request".to_string()))?;
        if !request.is_pending() {
            return Err(LedgerError::BusinessRule(
                "withdrawal request has already been processed".to_string(),
            ));
        }
        request.status = match decision {
            ReviewDecision::Approve => WithdrawalStatus::Approved,
            ReviewDecision::Reject => WithdrawalStatus::Rejected,
        };
        request.processed_at = Some(Utc::now());
        let processed = request.clone();
        info!(username = %processed.username, status = ?processed.status, "withdrawal reviewed");
        self.persist_withdrawals(&ledger).await;
        Ok(processed)
    }

    /// Reviews a receipt; approval marks the owning user as paid.
    pub async fn review_receipt(
        &self,
        receipt_id: Uuid,
        decision: ReviewDecision,
        reviewed_by: &str,
    ) -> Result<PaymentReceipt> {
        let mut ledger = self.ledger.lock().await;
        let receipt = ledger
            .receipt_mut(receipt_id)
            .ok_or_else(|| LedgerError::Validation("unknown receipt".to_string()))?;
        if !receipt.is_pending() {
            return Err(LedgerError::BusinessRule(
                "receipt has already been reviewed".to_string(),
            ));
        }
        receipt.status = match decision {
            ReviewDecision::Approve => ReceiptStatus::Approved,
            ReviewDecision::Reject => ReceiptStatus::Rejected,
        };
        receipt.reviewed_by = Some(reviewed_by.to_string());
        receipt.reviewed_at = Some(Utc::now());
        let reviewed = receipt.clone();
        info!(username = %reviewed.username, status = ?reviewed.status, "receipt reviewed");

        let mut owner_updated = false;
        if reviewed.status == ReceiptStatus::Approved {
            match ledger.user_mut(reviewed.user_id) {
                Some(user) => {
                    user.has_paid = true;
                    owner_updated = true;
                }
                None => warn!(user_id = %reviewed.user_id, "approved receipt references unknown user"),
            }
        }

        self.persist_receipts(&ledger).await;
        if owner_updated {
            self.persist_users(&ledger).await;
        }
        Ok(reviewed)
    }

    pub async fn user_view(&self, user_id: Uuid) -> Result<UserView> {
        let ledger = self.ledger.lock().await;
        ledger.user(user_id).map(User::view).ok_or_else(unknown_user)
    }

    /// All users, optionally filtered by a substring of the username
    /// (case-insensitive) or the user number.
    pub async fn list_users(&self, search: Option<&str>) -> Vec<UserView> {
        let ledger = self.ledger.lock().await;
        let needle = search.map(str::to_lowercase);
        ledger
            .users_ordered()
            .iter()
            .filter(|user| match (&needle, search) {
                (Some(lower), Some(raw)) => {
                    user.user_number.contains(raw) || user.username.to_lowercase().contains(lower)
                }
                _ => true,
            })
            .map(User::view)
            .collect()
    }

    pub async fn list_withdrawals(&self) -> Vec<WithdrawalRequest> {
        self.ledger.lock().await.withdrawals().to_vec()
    }

    pub async fn list_receipts(&self) -> Vec<PaymentReceipt> {
        self.ledger.lock().await.receipts_ordered()
    }

    pub async fn receipts_for(&self, user_id: Uuid) -> Vec<PaymentReceipt> {
        self.ledger.lock().await.receipts_for(user_id)
    }

    /// Saves all three collections unconditionally. Called on termination.
    pub async fn flush_all(&self) {
        let ledger = self.ledger.lock().await;
        self.persist_users(&ledger).await;
        self.persist_withdrawals(&ledger).await;
        self.persist_receipts(&ledger).await;
    }

    // Snapshot failures never roll back the applied in-memory mutation and
    // never surface to the caller; the log line is the observable side
    // channel.
    async fn persist_users(&self, ledger: &Ledger) {
        if let Err(err) = self.snapshots.save_users(&ledger.users_ordered()).await {
            error!(%err, "user snapshot write failed; in-memory state stays authoritative");
        }
    }

    async fn persist_withdrawals(&self, ledger: &Ledger) {
        if let Err(err) = self.snapshots.save_withdrawals(ledger.withdrawals()).await {
            error!(%err, "withdrawal snapshot write failed; in-memory state stays authoritative");
        }
    }

    async fn persist_receipts(&self, ledger: &Ledger) {
        if let Err(err) = self.snapshots.save_receipts(&ledger.receipts_ordered()).await {
            error!(%err, "receipt snapshot write failed; in-memory state stays authoritative");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::SnapshotStore;
    use crate::infrastructure::in_memory::InMemorySnapshots;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    async fn engine_with_store() -> (LedgerEngine, InMemorySnapshots) {
        let store = InMemorySnapshots::new();
        let engine = LedgerEngine::bootstrap(Box::new(store.clone())).await.unwrap();
        (engine, store)
    }

    #[tokio::test]
    async fn test_register_rejects_short_and_duplicate_usernames() {
        let (engine, _) = engine_with_store().await;

        let err = engine.register("ab", "hash").await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        engine.register("alice", "hash").await.unwrap();
        let err = engine.register("alice", "other-hash").await.unwrap_err();
        assert!(matches!(err, LedgerError::BusinessRule(_)));

        // The failed registration left no trace.
        let users = engine.list_users(None).await;
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_order_requires_assigned_quota() {
        let (engine, _) = engine_with_store().await;
        let user = engine.register("alice", "hash").await.unwrap();

        let err = engine
            .submit_order(user.id, OrderKind::Receive)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn test_order_completes_task_persists_and_broadcasts() {
        let (engine, store) = engine_with_store().await;
        let mut updates = engine.subscribe();

        let user = engine.register("alice", "hash").await.unwrap();
        engine
            .set_quota(user.id, Amount::new(dec!(100)).unwrap())
            .await
            .unwrap();
        updates.recv().await.unwrap(); // task-generation event

        engine
            .add_balance(user.id, Amount::new(dec!(40)).unwrap())
            .await
            .unwrap();
        updates.recv().await.unwrap(); // balance event

        let result = engine.submit_order(user.id, OrderKind::Receive).await.unwrap();
        assert_eq!(result.new_completions.len(), 1);
        assert_eq!(result.reward, dec!(20.0));
        assert_eq!(result.user.balance, dec!(60.0));
        assert_eq!(result.next_reward, dec!(10));

        let event = updates.recv().await.unwrap();
        assert_eq!(event.user_id, user.id);
        assert_eq!(event.new_completions.len(), 1);
        assert_eq!(event.user.balance, dec!(60.0));

        let persisted = store.load_users().await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].balance, dec!(60.0));
    }

    #[tokio::test]
    async fn test_withdrawal_rules() {
        let (engine, _) = engine_with_store().await;
        let user = engine.register("alice", "hash").await.unwrap();
        engine
            .set_quota(user.id, Amount::new(dec!(1000000)).unwrap())
            .await
            .unwrap();
        engine
            .add_balance(user.id, Amount::new(dec!(500)).unwrap())
            .await
            .unwrap();

        let below_min = engine
            .request_withdrawal(user.id, Amount::new(dec!(50)).unwrap(), "bc1qexample")
            .await
            .unwrap_err();
        assert!(below_min.to_string().contains("minimum withdrawal"));

        let over_balance = engine
            .request_withdrawal(user.id, Amount::new(dec!(5000)).unwrap(), "bc1qexample")
            .await
            .unwrap_err();
        assert!(over_balance.to_string().contains("insufficient balance"));

        let tasks_incomplete = engine
            .request_withdrawal(user.id, Amount::new(dec!(200)).unwrap(), "bc1qexample")
            .await
            .unwrap_err();
        assert!(tasks_incomplete.to_string().contains("completed"));

        assert!(engine.list_withdrawals().await.is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_review_is_terminal() {
        let (engine, _) = engine_with_store().await;
        // A user with no generated tasks passes the completion check
        // vacuously once the balance suffices.
        let user = engine.register("alice", "hash").await.unwrap();
        engine
            .add_balance(user.id, Amount::new(dec!(500)).unwrap())
            .await
            .unwrap();
        let request = engine
            .request_withdrawal(user.id, Amount::new(dec!(150)).unwrap(), "bc1qexample")
            .await
            .unwrap();

        let approved = engine
            .review_withdrawal(request.id, ReviewDecision::Approve)
            .await
            .unwrap();
        assert_eq!(approved.status, WithdrawalStatus::Approved);
        assert!(approved.processed_at.is_some());

        let err = engine
            .review_withdrawal(request.id, ReviewDecision::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::BusinessRule(_)));
        let listed = engine.list_withdrawals().await;
        assert_eq!(listed[0].status, WithdrawalStatus::Approved);
    }

    #[tokio::test]
    async fn test_receipt_approval_marks_user_paid() {
        let (engine, store) = engine_with_store().await;
        let user = engine.register("alice", "hash").await.unwrap();
        let receipt = engine
            .submit_receipt(
                user.id,
                Amount::new(dec!(189)).unwrap(),
                Some("gate payment".to_string()),
                StoredFile {
                    file_id: "receiptFile-1754000000-42.png".to_string(),
                    original_name: "proof.png".to_string(),
                },
            )
            .await
            .unwrap();

        let reviewed = engine
            .review_receipt(receipt.id, ReviewDecision::Approve, "admin")
            .await
            .unwrap();
        assert_eq!(reviewed.status, ReceiptStatus::Approved);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("admin"));

        let view = engine.user_view(user.id).await.unwrap();
        assert!(view.has_paid);
        let persisted = store.load_users().await.unwrap();
        assert!(persisted[0].has_paid);

        let err = engine
            .review_receipt(receipt.id, ReviewDecision::Reject, "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn test_list_users_search() {
        let (engine, _) = engine_with_store().await;
        engine.register("alice", "hash").await.unwrap();
        let bob = engine.register("bob", "hash").await.unwrap();

        assert_eq!(engine.list_users(None).await.len(), 2);
        let by_name = engine.list_users(Some("ALI")).await;
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].username, "alice");

        let by_number = engine.list_users(Some(&bob.user_number)).await;
        assert_eq!(by_number.len(), 1);
        assert_eq!(by_number[0].username, "bob");
    }

    #[tokio::test]
    async fn test_bootstrap_backfills_user_numbers() {
        let store = InMemorySnapshots::new();
        {
            let engine = LedgerEngine::bootstrap(Box::new(store.clone())).await.unwrap();
            engine.register("alice", "hash").await.unwrap();
        }

        // Strip the number the way a historical record would lack it.
        let mut users = store.load_users().await.unwrap();
        users[0].user_number = String::new();
        store.save_users(&users).await.unwrap();

        let engine = LedgerEngine::bootstrap(Box::new(store.clone())).await.unwrap();
        let repaired = engine.list_users(None).await;
        assert!(is_valid_user_number(&repaired[0].user_number));

        // The repaired collection was re-saved.
        let persisted = store.load_users().await.unwrap();
        assert!(is_valid_user_number(&persisted[0].user_number));
    }

    struct FailingSnapshots;

    #[async_trait]
    impl crate::domain::ports::SnapshotStore for FailingSnapshots {
        async fn save_users(&self, _: &[User]) -> Result<()> {
            Err(std::io::Error::other("disk full").into())
        }
        async fn load_users(&self) -> Result<Vec<User>> {
            Ok(Vec::new())
        }
        async fn save_withdrawals(&self, _: &[WithdrawalRequest]) -> Result<()> {
            Err(std::io::Error::other("disk full").into())
        }
        async fn load_withdrawals(&self) -> Result<Vec<WithdrawalRequest>> {
            Ok(Vec::new())
        }
        async fn save_receipts(&self, _: &[PaymentReceipt]) -> Result<()> {
            Err(std::io::Error::other("disk full").into())
        }
        async fn load_receipts(&self) -> Result<Vec<PaymentReceipt>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_snapshot_failure_does_not_fail_the_intent() {
        let engine = LedgerEngine::bootstrap(Box::new(FailingSnapshots)).await.unwrap();

        // The save fails on every mutation, but the caller still sees
        // success and the in-memory state is applied.
        let user = engine.register("alice", "hash").await.unwrap();
        let view = engine
            .add_balance(user.id, Amount::new(dec!(250)).unwrap())
            .await
            .unwrap();
        assert_eq!(view.balance, dec!(250));
        assert_eq!(engine.user_view(user.id).await.unwrap().balance, dec!(250));
    }
}
