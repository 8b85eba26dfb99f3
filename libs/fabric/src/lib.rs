//! Tether Fabric - Zero-copy publish/subscribe layer
//!
//! Provides the transport abstraction (publish and subscribe ports addressed by
//! channel triples, loaned buffers from a shared slot pool), an in-process
//! shared-pool backend, and codec support for fixed-layout records.
//!
//! # Example
//!
//! ```
//! use tether_core::ServiceTags;
//! use tether_fabric::{MemoryTransport, Transport, TypedPublisher, TypedSubscriber};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = MemoryTransport::new();
//! transport.register("demo")?;
//!
//! let address = ServiceTags::new("Ping", "Pong")?.request_channel();
//! let subscriber = TypedSubscriber::<u64, _>::new(transport.create_subscriber("demo", &address)?);
//! let publisher = TypedPublisher::<u64, _>::new(transport.create_publisher("demo", &address)?);
//!
//! publisher.send(&7)?;
//! assert_eq!(subscriber.take()?, Some(7));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod channel;
pub mod codec;
pub mod error;
pub mod pool;
pub mod transport;

// Re-exports for convenience
pub use channel::{TypedPublisher, TypedSubscriber};
pub use error::{Error, Result};
pub use pool::{LoanedSample, Sample};
pub use transport::{MemoryTransport, Publisher, Subscriber, Transport};
