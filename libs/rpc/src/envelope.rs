//! Wire records.
//!
//! Both records are encoded with fixed-width fields, so the client identity
//! always occupies the first eight bytes of a request sample.

use serde::{Deserialize, Serialize};
use tether_core::ClientId;

/// A request as published on the shared request channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<Req> {
    /// Routes the reply to the sender's private response channel
    pub client_id: ClientId,
    /// Echoed back in the [`Reply`]; lets the sender discard stale replies
    pub sequence: u64,
    pub payload: Req,
}

/// A response as published on a per-client response channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply<Resp> {
    pub sequence: u64,
    pub payload: Resp,
}
