use chrono::{DateTime, Utc};
use gp_common::Paise;
use greenplate_engine::{
    db_types::{
        MenuItem,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        ResaleId,
        ResaleItem,
        StaffProfile,
        UserProfile,
    },
    traits::{
        AccountManagement,
        CancellationCommit,
        CancellationOutcome,
        GatewayError,
        GatewayPaymentState,
        IntentHandle,
        LedgerDatabase,
        LedgerError,
        PaymentGateway,
        PaymentIntentSpec,
        PaymentSettlement,
        RefundHandle,
        RefundUpdate,
        SettlementOutcome,
    },
};
use mockall::mock;

mock! {
    pub Ledger {}

    impl Clone for Ledger {
        fn clone(&self) -> Self;
    }

    impl AccountManagement for Ledger {
        async fn fetch_user_profile(&self, uid: &str) -> Result<Option<UserProfile>, LedgerError>;
        async fn fetch_staff_profile(&self, uid: &str) -> Result<Option<StaffProfile>, LedgerError>;
        async fn fetch_menu_items(&self, stall_id: &str, item_ids: &[String]) -> Result<Vec<MenuItem>, LedgerError>;
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError>;
        async fn fetch_orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, LedgerError>;
        async fn fetch_orders_for_stall(&self, stall_id: &str, status: Option<OrderStatusType>) -> Result<Vec<Order>, LedgerError>;
        async fn fetch_resale_item(&self, resale_id: &ResaleId) -> Result<Option<ResaleItem>, LedgerError>;
        async fn fetch_resale_feed(&self, college_id: &str, now: DateTime<Utc>) -> Result<Vec<ResaleItem>, LedgerError>;
    }

    impl LedgerDatabase for Ledger {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError>;
        async fn settle_order_payment(&self, order_id: &OrderId, settlement: PaymentSettlement) -> Result<SettlementOutcome, LedgerError>;
        async fn record_refund_update(&self, order_id: &OrderId, update: RefundUpdate) -> Result<Order, LedgerError>;
        async fn update_order_status(&self, order_id: &OrderId, new_status: OrderStatusType) -> Result<Order, LedgerError>;
        async fn claim_order(&self, order_id: &OrderId, pickup_code: &str, staff: &StaffProfile) -> Result<Order, LedgerError>;
        async fn commit_cancellation(&self, commit: CancellationCommit) -> Result<CancellationOutcome, LedgerError>;
        async fn reserve_resale_item(&self, resale_id: &ResaleId, buyer_id: &str, now: DateTime<Utc>) -> Result<ResaleItem, LedgerError>;
    }
}

mock! {
    pub Gateway {}

    impl Clone for Gateway {
        fn clone(&self) -> Self;
    }

    impl PaymentGateway for Gateway {
        async fn create_intent(&self, spec: PaymentIntentSpec) -> Result<IntentHandle, GatewayError>;
        fn verify_client_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool;
        async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPaymentState, GatewayError>;
        async fn capture(&self, payment_id: &str, amount: Paise) -> Result<(), GatewayError>;
        async fn refund(&self, payment_id: &str, amount: Paise, metadata: &[(String, String)]) -> Result<RefundHandle, GatewayError>;
    }
}
