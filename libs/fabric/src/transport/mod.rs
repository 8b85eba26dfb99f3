use tether_core::ChannelAddress;

use crate::error::Result;
use crate::pool::{LoanedSample, Sample};

pub mod memory;

pub use self::memory::{
    MemoryPublisher, MemorySubscriber, MemoryTransport, MemoryTransportBuilder, MemoryTransportConfig,
};

/// A zero-copy publish/subscribe transport addressed by [`ChannelAddress`]
///
/// Every channel port belongs to a runtime registered under an application
/// name; constructing a port for an unregistered name fails.
pub trait Transport: Send + Sync {
    type Publisher: Publisher;
    type Subscriber: Subscriber;

    /// Register this process under `app_name`
    ///
    /// Registering a name twice is allowed and has no further effect.
    fn register(&self, app_name: &str) -> Result<()>;

    /// Create a publish port on `address` owned by `app_name`
    fn create_publisher(&self, app_name: &str, address: &ChannelAddress) -> Result<Self::Publisher>;

    /// Create a subscribe port on `address` owned by `app_name`
    fn create_subscriber(&self, app_name: &str, address: &ChannelAddress) -> Result<Self::Subscriber>;
}

/// Publish side of a channel
pub trait Publisher: Send + Sync {
    fn address(&self) -> &ChannelAddress;

    /// Acquire a writable slot from the shared pool
    fn loan(&self) -> Result<LoanedSample>;

    /// Deliver a filled slot to every current subscriber
    ///
    /// Fire-and-forget: there is no delivery acknowledgment.
    fn publish(&self, sample: LoanedSample) -> Result<()>;
}

/// Subscribe side of a channel
pub trait Subscriber: Send + Sync {
    fn address(&self) -> &ChannelAddress;

    /// Take the oldest queued sample without blocking
    fn take(&self) -> Result<Option<Sample>>;
}
