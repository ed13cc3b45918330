use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Cosmetic "next task reward" preview shown to the user.
///
/// A five-band step function over the current balance applied to a fixed
/// base unit. Informational only: actual balance growth is exclusively the
/// 1.5x compounding applied when a task completes, and the two computations
/// must stay separate.
pub fn next_reward_preview(balance: Decimal) -> Decimal {
    let base = dec!(10);
    if balance < dec!(100) {
        base
    } else if balance < dec!(500) {
        base * dec!(1.5)
    } else if balance < dec!(1000) {
        base * dec!(2)
    } else if balance < dec!(5000) {
        base * dec!(3)
    } else {
        base * dec!(5)
    }
}
