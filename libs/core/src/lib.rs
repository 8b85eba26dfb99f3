//! Tether Core - Identity, addressing and errors shared by the tether crates
//!
//! # Example
//!
//! ```
//! use tether_core::{call_site, derive_identity, ServiceTags};
//!
//! let tags = ServiceTags::new("AddRequest", "AddResponse").unwrap();
//! let id = derive_identity("calculator", &call_site!(), &tags.request, &tags.response);
//!
//! assert_eq!(tags.response_channel(id).instance, id.to_string());
//! ```

pub mod address;
pub mod error;
pub mod identity;

// Re-exports for convenience
pub use address::{ChannelAddress, ServiceTags, TypeTag};
pub use error::{Error, Result};
pub use identity::{derive_identity, CallSite, ClientId};
