use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Which counter a task reads its progress from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Receive,
    Give,
    Total,
    Balance,
    Daily,
    Weekly,
    Monthly,
}

/// One entry of the static task catalog shared by all users.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskDefinition {
    pub id: u32,
    pub title: &'static str,
    pub description: &'static str,
    pub target: u32,
    pub kind: TaskKind,
}

/// The fixed, ordered 25-entry catalog. Task ids double as catalog order.
pub const CATALOG: [TaskDefinition; 25] = [
    TaskDefinition {
        id: 1,
        title: "Receive your first order",
        description: "Receive your first order to get started",
        target: 1,
        kind: TaskKind::Receive,
    },
    TaskDefinition {
        id: 2,
        title: "Receive 5 orders",
        description: "Receive a total of 5 orders",
        target: 5,
        kind: TaskKind::Receive,
    },
    TaskDefinition {
        id: 3,
        title: "Receive 10 orders",
        description: "Receive a total of 10 orders",
        target: 10,
        kind: TaskKind::Receive,
    },
    TaskDefinition {
        id: 4,
        title: "Receive 20 orders",
        description: "Receive a total of 20 orders",
        target: 20,
        kind: TaskKind::Receive,
    },
    TaskDefinition {
        id: 5,
        title: "Receive 50 orders",
        description: "Receive a total of 50 orders",
        target: 50,
        kind: TaskKind::Receive,
    },
    TaskDefinition {
        id: 6,
        title: "Receive 100 orders",
        description: "Receive a total of 100 orders",
        target: 100,
        kind: TaskKind::Receive,
    },
    TaskDefinition {
        id: 7,
        title: "Send your first order",
        description: "Send your first order",
        target: 1,
        kind: TaskKind::Give,
    },
    TaskDefinition {
        id: 8,
        title: "Send 5 orders",
        description: "Send a total of 5 orders",
        target: 5,
        kind: TaskKind::Give,
    },
    TaskDefinition {
        id: 9,
        title: "Send 10 orders",
        description: "Send a total of 10 orders",
        target: 10,
        kind: TaskKind::Give,
    },
    TaskDefinition {
        id: 10,
        title: "Send 20 orders",
        description: "Send a total of 20 orders",
        target: 20,
        kind: TaskKind::Give,
    },
    TaskDefinition {
        id: 11,
        title: "Send 50 orders",
        description: "Send a total of 50 orders",
        target: 50,
        kind: TaskKind::Give,
    },
    TaskDefinition {
        id: 12,
        title: "Send 100 orders",
        description: "Send a total of 100 orders",
        target: 100,
        kind: TaskKind::Give,
    },
    TaskDefinition {
        id: 13,
        title: "Complete 50 orders in total",
        description: "Reach 50 combined received and sent orders",
        target: 50,
        kind: TaskKind::Total,
    },
    TaskDefinition {
        id: 14,
        title: "Complete 100 orders in total",
        description: "Reach 100 combined received and sent orders",
        target: 100,
        kind: TaskKind::Total,
    },
    TaskDefinition {
        id: 15,
        title: "Complete 200 orders in total",
        description: "Reach 200 combined received and sent orders",
        target: 200,
        kind: TaskKind::Total,
    },
    TaskDefinition {
        id: 16,
        title: "Reach a balance of 500",
        description: "Grow your balance to 500 credits",
        target: 500,
        kind: TaskKind::Balance,
    },
    TaskDefinition {
        id: 17,
        title: "Reach a balance of 1000",
        description: "Grow your balance to 1000 credits",
        target: 1000,
        kind: TaskKind::Balance,
    },
    TaskDefinition {
        id: 18,
        title: "Reach a balance of 5000",
        description: "Grow your balance to 5000 credits",
        target: 5000,
        kind: TaskKind::Balance,
    },
    TaskDefinition {
        id: 19,
        title: "Reach a balance of 10000",
        description: "Grow your balance to 10000 credits",
        target: 10000,
        kind: TaskKind::Balance,
    },
    TaskDefinition {
        id: 20,
        title: "Complete 10 orders in one day",
        description: "Complete 10 orders within a single day",
        target: 10,
        kind: TaskKind::Daily,
    },
    TaskDefinition {
        id: 21,
        title: "Complete 25 orders in one day",
        description: "Complete 25 orders within a single day",
        target: 25,
        kind: TaskKind::Daily,
    },
    TaskDefinition {
        id: 22,
        title: "Complete 50 orders in one day",
        description: "Complete 50 orders within a single day",
        target: 50,
        kind: TaskKind::Daily,
    },
    TaskDefinition {
        id: 23,
        title: "Complete 100 orders in one week",
        description: "Complete 100 orders within a single week",
        target: 100,
        kind: TaskKind::Weekly,
    },
    TaskDefinition {
        id: 24,
        title: "Complete 250 orders in one week",
        description: "Complete 250 orders within a single week",
        target: 250,
        kind: TaskKind::Weekly,
    },
    TaskDefinition {
        id: 25,
        title: "Complete 500 orders in one month",
        description: "Complete 500 orders within a single month",
        target: 500,
        kind: TaskKind::Monthly,
    },
];

/// Payment multiplier for gated catalog entries. Five tasks demand a payment
/// proportional to the user's quota; every other task is free.
pub fn payment_multiplier(task_id: u32) -> Decimal {
    match task_id {
        3 => dec!(1.89),
        8 => dec!(4.7),
        13 => dec!(15.3),
        20 => dec!(20),
        24 => dec!(32),
        _ => Decimal::ZERO,
    }
}

/// A per-user materialization of a catalog entry.
///
/// `required_payment` is frozen at generation time: later quota changes must
/// never alter it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstance {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub target: u32,
    pub kind: TaskKind,
    pub progress: Decimal,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub required_payment: Decimal,
}

impl TaskInstance {
    pub fn target_value(&self) -> Decimal {
        Decimal::from(self.target)
    }

    pub fn requires_payment(&self) -> bool {
        self.required_payment > Decimal::ZERO
    }
}

/// Stamps the catalog into a fresh task set for the given quota.
///
/// Callable at most once per user; the caller owns that idempotency. Calling
/// it again silently discards prior progress, which is preserved behavior.
pub fn generate_tasks(quota: Decimal) -> Vec<TaskInstance> {
    CATALOG
        .iter()
        .map(|def| TaskInstance {
            id: def.id,
            title: def.title.to_string(),
            description: def.description.to_string(),
            target: def.target,
            kind: def.kind,
            progress: Decimal::ZERO,
            completed: false,
            completed_at: None,
            required_payment: payment_multiplier(def.id) * quota,
        })
        .collect()
}
