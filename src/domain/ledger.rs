use crate::domain::receipt::PaymentReceipt;
use crate::domain::user::User;
use crate::domain::withdrawal::WithdrawalRequest;
use std::collections::HashMap;
use uuid::Uuid;

/// The authoritative in-memory state: users, withdrawal requests, and
/// payment receipts. Pure data access; business rules live in the task
/// engine and the coordinator. Durability is explicit: callers must ask
/// the snapshot store to persist.
#[derive(Debug, Default)]
pub struct Ledger {
    users: HashMap<Uuid, User>,
    withdrawals: Vec<WithdrawalRequest>,
    receipts: HashMap<Uuid, PaymentReceipt>,
}

impl Ledger {
    pub fn new(
        users: Vec<User>,
        withdrawals: Vec<WithdrawalRequest>,
        receipts: Vec<PaymentReceipt>,
    ) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
            withdrawals,
            receipts: receipts.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    pub fn user(&self, id: Uuid) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.get_mut(&id)
    }

    /// Linear scan; fine at this scale.
    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    pub fn user_number_taken(&self, number: &str) -> bool {
        self.users.values().any(|u| u.user_number == number)
    }

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn users_mut(&mut self) -> impl Iterator<Item = &mut User> {
        self.users.values_mut()
    }

    /// All users in a deterministic order (creation time, then id) for
    /// stable snapshots and listings.
    pub fn users_ordered(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        users
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn withdrawals(&self) -> &[WithdrawalRequest] {
        &self.withdrawals
    }

    pub fn withdrawal_mut(&mut self, id: Uuid) -> Option<&mut WithdrawalRequest> {
        self.withdrawals.iter_mut().find(|w| w.id == id)
    }

    pub fn push_withdrawal(&mut self, request: WithdrawalRequest) {
        self.withdrawals.push(request);
    }

    pub fn receipt_mut(&mut self, id: Uuid) -> Option<&mut PaymentReceipt> {
        self.receipts.get_mut(&id)
    }

    pub fn insert_receipt(&mut self, receipt: PaymentReceipt) {
        self.receipts.insert(receipt.id, receipt);
    }

    pub fn receipts_ordered(&self) -> Vec<PaymentReceipt> {
        let mut receipts: Vec<PaymentReceipt> = self.receipts.values().cloned().collect();
        receipts.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        receipts
    }

    pub fn receipts_for(&self, user_id: Uuid) -> Vec<PaymentReceipt> {
        self.receipts_ordered()
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect()
    }

    pub fn receipt_count(&self) -> usize {
        self.receipts.len()
    }
}
