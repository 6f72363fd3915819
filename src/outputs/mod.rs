//! Outbound notifications.
//!
//! # Submodules
//!
//! - [`discord`]: formats a classified item as a Discord webhook message and
//!   delivers it
//!
//! The [`Notifier`] trait is the seam the report pipeline depends on.

pub mod discord;

use crate::error::DeliveryError;
use discord::NotificationMessage;

/// Delivers a formatted message to the news channel.
pub trait Notifier {
    /// `Ok` only when the endpoint confirmed the message.
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError>;
}
