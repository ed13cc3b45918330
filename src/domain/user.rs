use crate::domain::task::{TaskInstance, TaskKind, generate_tasks};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two order actions a user can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Receive,
    Give,
}

/// What a successful order produced: the balance delta granted for a task
/// completion (zero when nothing completed) and the tasks that newly
/// completed during this call (at most one).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    pub reward: Decimal,
    pub new_completions: Vec<TaskInstance>,
}

/// A registered user and all state the task engine operates on.
///
/// Owned exclusively by the ledger; mutated only through the methods below
/// or admin intents on the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Unique 11-digit number matching `1\d{10}`. Historical records may
    /// lack it; startup repair backfills it, hence the serde default.
    #[serde(default)]
    pub user_number: String,
    pub username: String,
    pub password_hash: String,
    pub balance: Decimal,
    pub total_received: u64,
    pub total_given: u64,
    pub daily_orders: u64,
    pub weekly_orders: u64,
    pub monthly_orders: u64,
    pub last_daily_reset: NaiveDate,
    pub last_weekly_reset: NaiveDate,
    pub last_monthly_reset: NaiveDate,
    /// Empty until an admin first assigns a quota.
    pub tasks: Vec<TaskInstance>,
    /// Admin-assigned target amount. Zero means unset.
    pub quota: Decimal,
    pub has_paid: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

/// The fields of a user that cross the boundary to collaborators: everything
/// except the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub user_number: String,
    pub username: String,
    pub balance: Decimal,
    pub total_received: u64,
    pub total_given: u64,
    pub tasks: Vec<TaskInstance>,
    pub quota: Decimal,
    pub has_paid: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: Uuid,
        user_number: String,
        username: String,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        let today = now.date_naive();
        Self {
            id,
            user_number,
            username,
            password_hash,
            balance: Decimal::ZERO,
            total_received: 0,
            total_given: 0,
            daily_orders: 0,
            weekly_orders: 0,
            monthly_orders: 0,
            last_daily_reset: today,
            last_weekly_reset: today,
            last_monthly_reset: today,
            tasks: Vec::new(),
            quota: Decimal::ZERO,
            has_paid: false,
            created_at: now,
            last_login: now,
        }
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            user_number: self.user_number.clone(),
            username: self.username.clone(),
            balance: self.balance,
            total_received: self.total_received,
            total_given: self.total_given,
            tasks: self.tasks.clone(),
            quota: self.quota,
            has_paid: self.has_paid,
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }

    /// First incomplete task in catalog order, if any remain.
    pub fn next_incomplete_task(&self) -> Option<&TaskInstance> {
        self.tasks.iter().find(|task| !task.completed)
    }

    pub fn completed_task_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.completed).count()
    }

    /// Vacuously true while no tasks have been generated.
    pub fn all_tasks_completed(&self) -> bool {
        self.tasks.iter().all(|task| task.completed)
    }

    /// Assigns the quota. The first assignment materializes the task set;
    /// later assignments update the quota only and leave the tasks (and
    /// their frozen `required_payment`s) untouched. Returns whether tasks
    /// were generated.
    pub fn assign_quota(&mut self, quota: Decimal) -> bool {
        self.quota = quota;
        if self.tasks.is_empty() {
            self.tasks = generate_tasks(quota);
            true
        } else {
            false
        }
    }

    /// Applies one order action: resets stale rolling windows, bumps the
    /// counters, re-derives progress for every incomplete task, and
    /// completes at most the first task that reached its target.
    ///
    /// All-or-nothing: the method works on a scratch copy and commits it
    /// only on success, so a payment-gate rejection leaves the user exactly
    /// as it was, counters and window markers included.
    pub fn record_order(&mut self, kind: OrderKind, now: DateTime<Utc>) -> Result<OrderOutcome> {
        let mut next = self.clone();
        next.reset_stale_windows(now.date_naive());

        // Every gated task re-demands fresh payment verification.
        let next_task_gated = next
            .next_incomplete_task()
            .is_some_and(TaskInstance::requires_payment);
        if next_task_gated {
            next.has_paid = false;
        }

        match kind {
            OrderKind::Receive => next.total_received += 1,
            OrderKind::Give => next.total_given += 1,
        }
        next.daily_orders += 1;
        next.weekly_orders += 1;
        next.monthly_orders += 1;

        let balance = next.balance;
        let total_received = next.total_received;
        let total_given = next.total_given;
        let daily = next.daily_orders;
        let weekly = next.weekly_orders;
        let monthly = next.monthly_orders;
        for task in next.tasks.iter_mut().filter(|task| !task.completed) {
            let current = match task.kind {
                TaskKind::Receive => Decimal::from(total_received),
                TaskKind::Give => Decimal::from(total_given),
                TaskKind::Total => Decimal::from(total_received + total_given),
                TaskKind::Balance => balance,
                TaskKind::Daily => Decimal::from(daily),
                TaskKind::Weekly => Decimal::from(weekly),
                TaskKind::Monthly => Decimal::from(monthly),
            };
            task.progress = current.min(task.target_value());
        }

        // Completion is one-shot per call: only the first task that reached
        // its target may complete.
        let mut reward = Decimal::ZERO;
        let mut new_completions = Vec::new();
        let reached = next
            .tasks
            .iter()
            .position(|task| !task.completed && task.progress >= task.target_value());
        if let Some(index) = reached {
            if next.tasks[index].requires_payment() && !next.has_paid {
                let required = next.tasks[index].required_payment;
                if next.quota < required {
                    return Err(LedgerError::BusinessRule(format!(
                        "insufficient quota for payment gate: {} required, {} available",
                        required.normalize(),
                        next.quota.normalize()
                    )));
                }
                next.has_paid = true;
            }
            let before = next.balance;
            next.balance *= dec!(1.5);
            reward = next.balance - before;
            let task = &mut next.tasks[index];
            task.completed = true;
            task.completed_at = Some(now);
            new_completions.push(task.clone());
        }

        *self = next;
        Ok(OrderOutcome {
            reward,
            new_completions,
        })
    }

    fn reset_stale_windows(&mut self, today: NaiveDate) {
        if today != self.last_daily_reset {
            self.daily_orders = 0;
            self.last_daily_reset = today;
        }
        if today.iso_week() != self.last_weekly_reset.iso_week() {
            self.weekly_orders = 0;
            self.last_weekly_reset = today;
        }
        if (today.year(), today.month())
            != (self.last_monthly_reset.year(), self.last_monthly_reset.month())
        {
            self.monthly_orders = 0;
            self.last_monthly_reset = today;
        }
    }
}

pub fn is_valid_user_number(value: &str) -> bool {
    value.len() == 11 && value.starts_with('1') && value.bytes().all(|b| b.is_ascii_digit())
}

/// Draws random 11-digit numbers starting with 1 until one is free.
pub fn generate_user_number(mut is_taken: impl FnMut(&str) -> bool) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let tail: u64 = rng.gen_range(0..10_000_000_000);
        let candidate = format!("1{tail:010}");
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}
