//! Identity service client for Palaver.

mod client;

pub use client::IdentityClient;
