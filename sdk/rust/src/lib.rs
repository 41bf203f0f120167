//! Client for the gateway's admin API.

mod client;

pub use client::{AdminClient, AdminReply};
