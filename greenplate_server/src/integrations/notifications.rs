//! Notification hooks.
//!
//! Buyer-facing mail is delivered by an external collaborator; the engine only publishes
//! fire-and-forget events at the two moments worth telling someone about. The handlers
//! registered here are where that collaborator plugs in; until then they log the event so the
//! moments are at least observable.
use greenplate_engine::events::{EventHandlers, EventHooks};
use log::info;

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 25;

pub fn create_notification_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|event| {
        Box::pin(async move {
            info!(
                "📣️ Order {} paid by {}; pickup notification due",
                event.order.order_id, event.order.buyer_id
            );
        })
    });
    hooks.on_order_cancelled(|event| {
        Box::pin(async move {
            let refund = event.order.refund.as_ref().map(|r| r.amount.to_string()).unwrap_or_default();
            info!(
                "📣️ Order {} cancelled by {}; refund of {refund} underway",
                event.order.order_id, event.order.buyer_id
            );
        })
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}
