//! Real-time WebSocket text channel for Palaver.
//!
//! A [`ChannelClient`] owns at most one live connection. Inbound text frames
//! are fanned out, in arrival order, to every live [`Subscription`].

mod client;
mod error;
mod subscription;

pub use client::ChannelClient;
pub use error::ChannelError;
pub use subscription::{Subscription, SubscriptionId};
