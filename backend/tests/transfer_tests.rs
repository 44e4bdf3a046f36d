//! Inter-store transfer tests
//!
//! State machine transitions and the stock checks made at every step.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    ensure_stock_covers, plan_stock_change, validate_transfer_stores, DomainError,
    NegativeStockPolicy, TransferAction, TransferStatus,
};
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

const ALL_STATUSES: [TransferStatus; 4] = [
    TransferStatus::Pending,
    TransferStatus::Approved,
    TransferStatus::Completed,
    TransferStatus::Rejected,
];

const ALL_ACTIONS: [TransferAction; 3] = [
    TransferAction::Approve,
    TransferAction::Reject,
    TransferAction::Complete,
];

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Move 5 units from a store holding 20 to a store without the SKU
    #[test]
    fn test_full_transfer_lifecycle() {
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        validate_transfer_stores(from, to).unwrap();

        let quantity = dec("5");
        let source_stock = dec("20");

        ensure_stock_covers(source_stock, quantity).unwrap();
        let status = TransferStatus::Pending;

        ensure_stock_covers(source_stock, quantity).unwrap();
        let status = TransferAction::Approve.apply(status).unwrap();
        assert_eq!(status, TransferStatus::Approved);

        ensure_stock_covers(source_stock, quantity).unwrap();
        let outgoing = plan_stock_change(source_stock, -quantity, NegativeStockPolicy::Reject).unwrap();
        let incoming = plan_stock_change(Decimal::ZERO, quantity, NegativeStockPolicy::Reject).unwrap();
        let status = TransferAction::Complete.apply(status).unwrap();

        assert_eq!(outgoing.new_stock, dec("15"));
        assert_eq!(incoming.new_stock, dec("5"));
        assert_eq!(status, TransferStatus::Completed);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_same_store_rejected() {
        let store = Uuid::new_v4();
        assert_eq!(validate_transfer_stores(store, store), Err(DomainError::SameStore));
    }

    #[test]
    fn test_reject_only_from_pending() {
        assert_eq!(
            TransferAction::Reject.apply(TransferStatus::Pending),
            Ok(TransferStatus::Rejected)
        );
        assert_eq!(
            TransferAction::Reject.apply(TransferStatus::Approved),
            Err(DomainError::InvalidTransition {
                action: "reject",
                current: TransferStatus::Approved,
            })
        );
    }

    #[test]
    fn test_complete_requires_approval() {
        assert!(TransferAction::Complete.apply(TransferStatus::Pending).is_err());
        assert!(TransferAction::Complete.apply(TransferStatus::Rejected).is_err());
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for status in [TransferStatus::Completed, TransferStatus::Rejected] {
            for action in ALL_ACTIONS {
                assert!(action.apply(status).is_err(), "{:?} from {}", action, status);
            }
        }
    }

    #[test]
    fn test_stock_drained_after_approval_blocks_completion() {
        let quantity = dec("5");
        ensure_stock_covers(dec("20"), quantity).unwrap();
        // another sale took the stock while the transfer sat approved
        assert_eq!(
            ensure_stock_covers(dec("3"), quantity),
            Err(DomainError::InsufficientStock {
                available: dec("3"),
                requested: quantity,
            })
        );
    }

    #[test]
    fn test_reject_skips_stock_recheck() {
        assert!(TransferAction::Approve.rechecks_stock());
        assert!(TransferAction::Complete.rechecks_stock());
        assert!(!TransferAction::Reject.rechecks_stock());
    }

    #[test]
    fn test_status_strings() {
        for status in ALL_STATUSES {
            assert_eq!(TransferStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TransferStatus::from_str("cancelled"), None);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn rank(status: TransferStatus) -> u8 {
        match status {
            TransferStatus::Pending => 0,
            TransferStatus::Approved => 1,
            TransferStatus::Completed | TransferStatus::Rejected => 2,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Any sequence of actions only ever moves forward and never
        /// revisits a state
        #[test]
        fn prop_state_monotonicity(actions in prop::collection::vec(0usize..3, 0..12)) {
            let mut status = TransferStatus::Pending;
            let mut visited = vec![status];

            for index in actions {
                if let Ok(next) = ALL_ACTIONS[index].apply(status) {
                    prop_assert!(rank(next) > rank(status));
                    prop_assert!(!visited.contains(&next));
                    visited.push(next);
                    status = next;
                }
            }

            prop_assert!(visited.len() <= 3);
        }

        /// An action succeeds exactly when the status is the one it requires
        #[test]
        fn prop_action_requires_status(status_index in 0usize..4, action_index in 0usize..3) {
            let status = ALL_STATUSES[status_index];
            let action = ALL_ACTIONS[action_index];
            prop_assert_eq!(action.apply(status).is_ok(), status == action.required_status());
        }

        /// Completion moves exactly `quantity` out of the source and into the destination
        #[test]
        fn prop_completion_conserves_stock(
            source in 1i64..10_000,
            destination in 0i64..10_000,
            quantity in 1i64..10_000
        ) {
            let (source, destination, quantity) =
                (Decimal::from(source), Decimal::from(destination), Decimal::from(quantity));

            match ensure_stock_covers(source, quantity) {
                Ok(()) => {
                    let out = plan_stock_change(source, -quantity, NegativeStockPolicy::Reject).unwrap();
                    let inn = plan_stock_change(destination, quantity, NegativeStockPolicy::Reject).unwrap();
                    prop_assert_eq!(out.new_stock + inn.new_stock, source + destination);
                    prop_assert_eq!(inn.new_stock - destination, quantity);
                }
                Err(_) => prop_assert!(source < quantity),
            }
        }
    }
}
