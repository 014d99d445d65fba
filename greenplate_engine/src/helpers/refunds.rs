use gp_common::Paise;

use crate::db_types::{OrderStatusType, RefundType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundTier {
    pub amount: Paise,
    pub refund_type: RefundType,
}

/// The refund a buyer is owed when cancelling an order in `status`.
///
/// | Pre-cancel status | Amount                          | Type           |
/// |-------------------|---------------------------------|----------------|
/// | PENDING, PAID     | full total                      | FULL_REFUND    |
/// | READY             | floor(total × percent / 100)    | PARTIAL_REFUND |
/// | anything else     | zero                            | NO_REFUND      |
///
/// `percent` is the order's snapshotted `ready_refund_percent` policy, not a live lookup.
pub fn refund_tier(status: OrderStatusType, total: Paise, percent: u32) -> RefundTier {
    match status {
        OrderStatusType::Pending | OrderStatusType::Paid => {
            RefundTier { amount: total, refund_type: RefundType::FullRefund }
        },
        OrderStatusType::Ready => RefundTier { amount: total.percent(percent), refund_type: RefundType::PartialRefund },
        _ => RefundTier { amount: Paise::from(0), refund_type: RefundType::NoRefund },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pending_and_paid_refund_in_full() {
        let total = Paise::from(10_000);
        for status in [OrderStatusType::Pending, OrderStatusType::Paid] {
            let tier = refund_tier(status, total, 50);
            assert_eq!(tier.amount, total);
            assert_eq!(tier.refund_type, RefundType::FullRefund);
        }
    }

    #[test]
    fn ready_refunds_by_policy_percent() {
        let tier = refund_tier(OrderStatusType::Ready, Paise::from(10_000), 50);
        assert_eq!(tier.amount, Paise::from(5_000));
        assert_eq!(tier.refund_type, RefundType::PartialRefund);

        // floor, never round up
        let tier = refund_tier(OrderStatusType::Ready, Paise::from(10_001), 50);
        assert_eq!(tier.amount, Paise::from(5_000));

        let tier = refund_tier(OrderStatusType::Ready, Paise::from(10_000), 30);
        assert_eq!(tier.amount, Paise::from(3_000));
    }

    #[test]
    fn everything_else_gets_nothing() {
        for status in [OrderStatusType::Claimed, OrderStatusType::Completed, OrderStatusType::Cancelled] {
            let tier = refund_tier(status, Paise::from(10_000), 50);
            assert_eq!(tier.amount, Paise::from(0));
            assert_eq!(tier.refund_type, RefundType::NoRefund);
        }
    }
}
