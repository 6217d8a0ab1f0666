//! entregas client library
//!
//! Headless client for the Bot das Entregas WhatsApp delivery assistant:
//! account access, subscription checkout, device pairing over REST plus a
//! push-event channel, monitored-group management, and the referral and
//! withdrawal flows.

#![allow(dead_code)]

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod events;
pub mod flow;
pub mod groups;
pub mod logging;
pub mod pairing;
pub mod withdrawals;
