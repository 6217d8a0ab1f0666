//! Post-login routing
//!
//! After authentication the client lands on one of three surfaces depending
//! on what the backend reports: unpaid accounts go to checkout, paid
//! accounts without a live device go to pairing, and paid accounts with a
//! connected device go straight to the assistant.

use crate::api::bot::{BotStatus, PaymentStatus};

/// Where a freshly authenticated session should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Subscription unpaid, checkout first.
    Payment,
    /// Paid but no device connected, pairing next.
    Connect,
    /// Paid and connected, straight to the assistant.
    Assistant,
}

/// Decide the landing surface. An unknown connection state (the status call
/// failed or was skipped) routes to pairing, which is safe to show a
/// connected account.
pub fn post_login_destination(
    payment: PaymentStatus,
    connection: Option<BotStatus>,
) -> Destination {
    match (payment, connection) {
        (PaymentStatus::Pending, _) => Destination::Payment,
        (PaymentStatus::Paid, Some(BotStatus::Connected)) => Destination::Assistant,
        (PaymentStatus::Paid, _) => Destination::Connect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaid_always_routes_to_checkout() {
        for connection in [None, Some(BotStatus::Connected), Some(BotStatus::Disconnected)] {
            assert_eq!(
                post_login_destination(PaymentStatus::Pending, connection),
                Destination::Payment
            );
        }
    }

    #[test]
    fn paid_and_connected_routes_to_assistant() {
        assert_eq!(
            post_login_destination(PaymentStatus::Paid, Some(BotStatus::Connected)),
            Destination::Assistant
        );
    }

    #[test]
    fn paid_without_connection_routes_to_pairing() {
        assert_eq!(
            post_login_destination(PaymentStatus::Paid, Some(BotStatus::Disconnected)),
            Destination::Connect
        );
        assert_eq!(
            post_login_destination(PaymentStatus::Paid, None),
            Destination::Connect
        );
    }
}
