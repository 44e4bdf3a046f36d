//! Stock ledger arithmetic
//!
//! A stock change is always planned here first and only then persisted,
//! together with exactly one movement row carrying the same numbers. The
//! backend never computes `new_stock` on its own.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::models::MovementType;

/// Decimal places stored for every stock, movement and recipe quantity
pub const STOCK_SCALE: u32 = 4;

/// True when `quantity` can be stored without rounding
pub fn fits_stock_scale(quantity: Decimal) -> bool {
    quantity.normalize().scale() <= STOCK_SCALE
}

/// What to do when a delta would take stock below zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeStockPolicy {
    /// Refuse the change with `InsufficientStock`
    #[default]
    Reject,
    /// Floor the result at zero; the recorded quantity is what was actually removed.
    /// Only manual decrease adjustments use this.
    ClampAtZero,
}

/// The before/after values of one ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    /// Absolute size of the applied change
    pub quantity: Decimal,
}

impl StockChange {
    /// Signed delta that was actually applied
    pub fn applied_delta(&self) -> Decimal {
        self.new_stock - self.previous_stock
    }
}

/// Plan a signed stock change against the current head of the ledger
pub fn plan_stock_change(
    previous_stock: Decimal,
    delta: Decimal,
    policy: NegativeStockPolicy,
) -> Result<StockChange, DomainError> {
    if delta.is_zero() {
        return Err(DomainError::NonPositiveQuantity);
    }
    if !fits_stock_scale(delta) || !fits_stock_scale(previous_stock) {
        return Err(DomainError::QuantityTooPrecise {
            max_scale: STOCK_SCALE,
        });
    }

    let mut new_stock = previous_stock + delta;
    if new_stock < Decimal::ZERO {
        match policy {
            NegativeStockPolicy::Reject => {
                return Err(DomainError::InsufficientStock {
                    available: previous_stock,
                    requested: delta.abs(),
                });
            }
            NegativeStockPolicy::ClampAtZero => new_stock = Decimal::ZERO,
        }
    }

    Ok(StockChange {
        previous_stock,
        new_stock,
        quantity: (new_stock - previous_stock).abs(),
    })
}

/// Direction of an operator-initiated stock correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
}

impl AdjustmentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentDirection::Increase => "increase",
            AdjustmentDirection::Decrease => "decrease",
        }
    }

    /// Signed delta for a positive adjustment quantity
    pub fn signed(&self, quantity: Decimal) -> Decimal {
        match self {
            AdjustmentDirection::Increase => quantity,
            AdjustmentDirection::Decrease => -quantity,
        }
    }

    pub fn policy(&self) -> NegativeStockPolicy {
        match self {
            AdjustmentDirection::Increase => NegativeStockPolicy::Reject,
            AdjustmentDirection::Decrease => NegativeStockPolicy::ClampAtZero,
        }
    }
}

/// Signed delta for a direct ingredient stock update.
/// `in` and `adjustment` add, `out` removes; anything else is not a valid update.
pub fn ingredient_update_delta(movement_type: MovementType, quantity: Decimal) -> Option<Decimal> {
    match movement_type {
        MovementType::In | MovementType::Adjustment => Some(quantity),
        MovementType::Out => Some(-quantity),
        MovementType::Transfer | MovementType::Usage => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_increase() {
        let change = plan_stock_change(d(10), d(5), NegativeStockPolicy::Reject).unwrap();
        assert_eq!(change.previous_stock, d(10));
        assert_eq!(change.new_stock, d(15));
        assert_eq!(change.quantity, d(5));
    }

    #[test]
    fn test_decrease_to_exactly_zero_is_allowed() {
        let change = plan_stock_change(d(7), d(-7), NegativeStockPolicy::Reject).unwrap();
        assert_eq!(change.new_stock, Decimal::ZERO);
        assert_eq!(change.quantity, d(7));
    }

    #[test]
    fn test_negative_result_rejected() {
        let err = plan_stock_change(d(3), d(-4), NegativeStockPolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: d(3),
                requested: d(4),
            }
        );
    }

    #[test]
    fn test_clamp_records_actual_decrement() {
        let change =
            plan_stock_change(d(10), d(-30), NegativeStockPolicy::ClampAtZero).unwrap();
        assert_eq!(change.new_stock, Decimal::ZERO);
        assert_eq!(change.quantity, d(10));
        assert_eq!(change.applied_delta(), d(-10));
    }

    #[test]
    fn test_zero_delta_rejected() {
        assert_eq!(
            plan_stock_change(d(10), Decimal::ZERO, NegativeStockPolicy::Reject),
            Err(DomainError::NonPositiveQuantity)
        );
    }

    #[test]
    fn test_delta_finer_than_stock_scale_rejected() {
        // 0.00005 would be rounded away by the database
        assert_eq!(
            plan_stock_change(d(10), Decimal::new(-5, 5), NegativeStockPolicy::ClampAtZero),
            Err(DomainError::QuantityTooPrecise { max_scale: 4 })
        );

        let change =
            plan_stock_change(d(10), Decimal::new(-5, 4), NegativeStockPolicy::Reject).unwrap();
        assert_eq!(change.new_stock, Decimal::new(99995, 4));
        assert_eq!(change.quantity, Decimal::new(5, 4));
    }

    #[test]
    fn test_trailing_zeros_do_not_count_as_precision() {
        assert!(fits_stock_scale(Decimal::new(150_000, 5)));
        assert!(!fits_stock_scale(Decimal::new(150_001, 5)));
    }

    #[test]
    fn test_adjustment_direction() {
        assert_eq!(AdjustmentDirection::Decrease.signed(d(4)), d(-4));
        assert_eq!(
            AdjustmentDirection::Decrease.policy(),
            NegativeStockPolicy::ClampAtZero
        );
        assert_eq!(
            AdjustmentDirection::Increase.policy(),
            NegativeStockPolicy::Reject
        );
    }

    #[test]
    fn test_ingredient_update_delta() {
        assert_eq!(ingredient_update_delta(MovementType::Out, d(2)), Some(d(-2)));
        assert_eq!(ingredient_update_delta(MovementType::Adjustment, d(2)), Some(d(2)));
        assert_eq!(ingredient_update_delta(MovementType::Usage, d(2)), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn stock() -> impl Strategy<Value = Decimal> {
            (0i64..10_000_000).prop_map(|n| Decimal::new(n, 3))
        }

        fn delta() -> impl Strategy<Value = Decimal> {
            (-10_000_000i64..10_000_000)
                .prop_filter("non-zero", |n| *n != 0)
                .prop_map(|n| Decimal::new(n, 4))
        }

        proptest! {
            #[test]
            fn planned_change_is_exact_at_stock_scale(
                previous in stock(),
                delta in delta(),
                clamp in any::<bool>(),
            ) {
                let policy = if clamp {
                    NegativeStockPolicy::ClampAtZero
                } else {
                    NegativeStockPolicy::Reject
                };

                match plan_stock_change(previous, delta, policy) {
                    Ok(change) => {
                        prop_assert!(change.new_stock >= Decimal::ZERO);
                        prop_assert_eq!(change.quantity, (change.previous_stock - change.new_stock).abs());
                        prop_assert!(fits_stock_scale(change.new_stock));
                        prop_assert!(fits_stock_scale(change.quantity));
                        prop_assert_eq!(change.new_stock.round_dp(STOCK_SCALE), change.new_stock);
                    }
                    Err(err) => {
                        prop_assert!(!clamp);
                        prop_assert!(previous + delta < Decimal::ZERO);
                        let is_insufficient = matches!(err, DomainError::InsufficientStock { .. });
                        prop_assert!(is_insufficient);
                    }
                }
            }

            #[test]
            fn finer_deltas_never_reach_storage(
                previous in stock(),
                units in 1i64..1_000_000,
            ) {
                let delta = -Decimal::new(units * 10 + 1, 5);
                prop_assert_eq!(
                    plan_stock_change(previous, delta, NegativeStockPolicy::ClampAtZero),
                    Err(DomainError::QuantityTooPrecise { max_scale: STOCK_SCALE })
                );
            }
        }
    }
}
