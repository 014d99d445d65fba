//! GreenPlate Order & Payment Engine
//!
//! The engine is the coordination core of the GreenPlate campus food marketplace: it drives the
//! order state machine, reconciles the two racing payment-confirmation paths (client verify and
//! gateway webhook) into exactly-once PENDING→PAID transitions, computes tiered refunds under the
//! weekly cancellation quota, and runs the resale marketplace with its TTL-bounded reservations.
//!
//! The library is divided into three main sections:
//! 1. Database types and the storage ports ([`mod@db_types`], [`mod@traits`]). SQLite is the
//!    supported backend. You should never need to touch the database directly; use the flow APIs
//!    instead. The exception is the data types, which are public.
//! 2. The flow APIs ([`OrderFlowApi`], [`ResaleApi`], [`AccountApi`]): checkout, settlement,
//!    pickup, cancellation, the resale marketplace, and read-side account queries. They are
//!    generic over the storage port and the payment-gateway port, so any backend implementing
//!    the traits can drive them.
//! 3. An event hook system ([`mod@events`]): fire-and-forget notifications (order paid, order
//!    cancelled) that external collaborators such as the mailer can subscribe to.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

mod gpe_api;

#[cfg(feature = "sqlite")]
mod sqlite;

#[doc(hidden)]
#[cfg(feature = "sqlite")]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use gpe_api::{
    accounts_api::AccountApi,
    errors::OrderFlowError,
    order_flow_api::OrderFlowApi,
    order_objects,
    resale_api::ResaleApi,
};
