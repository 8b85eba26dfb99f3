//! Tether RPC - Request/response correlation over publish/subscribe
//!
//! Clients publish [`Envelope`]s on one shared request channel per
//! request/response pair. Servers answer each envelope on a response channel
//! private to its sender, opened on first contact and kept in a
//! [`ClientRegistry`]. Both roles poll cooperatively on the calling thread;
//! nothing here spawns a thread.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use serde::{Deserialize, Serialize};
//! use tether_core::{call_site, ServiceTags};
//! use tether_fabric::MemoryTransport;
//! use tether_rpc::{CallDriver, CallDriverBuilder, DispatchLoop, DispatchLoopBuilder};
//!
//! #[derive(Serialize, Deserialize)]
//! struct AddRequest { a: u64, b: u64 }
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct AddResponse { result: u64 }
//!
//! # fn example() -> Result<(), tether_core::Error> {
//! let transport = MemoryTransport::new();
//! let tags = ServiceTags::new("AddRequest", "AddResponse")?;
//!
//! let server: DispatchLoop<AddRequest, AddResponse> =
//!     DispatchLoopBuilder::new(tags.clone()).build(&transport)?;
//! let mut client: CallDriver<AddRequest, AddResponse> = CallDriverBuilder::new(tags)
//!     .app_name("calculator")
//!     .call_site(call_site!())
//!     .build(&transport)?;
//!
//! // No reply required: the request is only published
//! client.send(AddRequest { a: 2, b: 4 })?;
//!
//! server.serve_once(
//!     |req: &AddRequest, resp: &mut AddResponse| {
//!         resp.result = req.a + req.b;
//!         true
//!     },
//!     Duration::from_millis(100),
//! )?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod client;
pub mod config;
pub mod envelope;
pub mod registry;
pub mod server;

// Re-exports for convenience
pub use client::{CallDriver, CallDriverBuilder};
pub use config::PollConfig;
pub use envelope::{Envelope, Reply};
pub use registry::ClientRegistry;
pub use server::{AsyncHandler, DispatchLoop, DispatchLoopBuilder};
pub use tether_core::{Error, Result};
