//! The ports the engine is written against.
//!
//! [`LedgerDatabase`] is the storage port: the authoritative order ledger plus the resale item
//! collection and user quota records, with the three atomic read-modify-write operations all
//! cross-request coordination relies on. [`PaymentGateway`] is the payment-processor port.
//! Backends implement these traits; the flow APIs never see a concrete database or gateway.
mod accounts;
mod data_objects;
mod ledger;
mod payment_gateway;

pub use accounts::AccountManagement;
pub use data_objects::{
    CancellationCommit,
    CancellationOutcome,
    PaymentSettlement,
    RefundUpdate,
    SettlementOutcome,
};
pub use ledger::{LedgerDatabase, LedgerError};
pub use payment_gateway::{GatewayError, GatewayPaymentState, IntentHandle, PaymentGateway, PaymentIntentSpec, RefundHandle};
