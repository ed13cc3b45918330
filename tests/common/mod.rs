use rust_decimal::Decimal;
use taskledger::application::engine::LedgerEngine;
use taskledger::domain::money::Amount;
use taskledger::domain::user::{OrderKind, UserView};
use uuid::Uuid;

pub fn amount(value: i64) -> Amount {
    Amount::new(Decimal::from(value)).unwrap()
}

pub async fn submit_orders(engine: &LedgerEngine, user_id: Uuid, kind: OrderKind, count: usize) {
    for _ in 0..count {
        engine
            .submit_order(user_id, kind)
            .await
            .expect("order should succeed");
    }
}

/// Drives a freshly registered user through the entire catalog.
///
/// A small initial quota freezes small payment requirements, the follow-up
/// raise clears every gate (largest frozen requirement is 32 x 10 = 320),
/// and the balance credit covers the balance-tier targets. Orders then
/// alternate until nothing incomplete remains; the generous cap absorbs a
/// window reset if the test happens to straddle a UTC boundary.
pub async fn complete_all_tasks(engine: &LedgerEngine, user_id: Uuid) -> UserView {
    engine.set_quota(user_id, amount(10)).await.unwrap();
    engine.set_quota(user_id, amount(1000)).await.unwrap();
    engine.add_balance(user_id, amount(20_000)).await.unwrap();

    for round in 0..2000usize {
        let view = engine.user_view(user_id).await.unwrap();
        if view.tasks.iter().all(|task| task.completed) {
            return view;
        }
        let kind = if round % 2 == 0 {
            OrderKind::Receive
        } else {
            OrderKind::Give
        };
        engine
            .submit_order(user_id, kind)
            .await
            .expect("order should succeed");
    }
    panic!("tasks did not complete within the order cap");
}
