//! In-process shared-pool transport.
//!
//! Models a shared-memory segment inside one process: a single fixed slot pool
//! shared by every publisher, topics keyed by [`ChannelAddress`], and one
//! bounded FIFO queue per subscriber. Published samples are delivered by
//! reference, never copied.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tether_core::ChannelAddress;

use crate::error::{Error, Result};
use crate::pool::{LoanedSample, Sample, SlotPool};
use crate::transport::{Publisher, Subscriber, Transport};

/// Default size of one pool slot in bytes
pub const DEFAULT_SLOT_SIZE: usize = 4096;
/// Default number of slots in the pool
pub const DEFAULT_SLOT_COUNT: usize = 256;
/// Default per-subscriber queue depth
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Sizing of a [`MemoryTransport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryTransportConfig {
    /// Bytes per loaned buffer
    pub slot_size: usize,
    /// Buffers in the shared pool
    pub slot_count: usize,
    /// Samples a subscriber holds before the oldest is dropped
    pub queue_capacity: usize,
    /// Maximum live ports (publishers plus subscribers), unlimited if `None`
    pub max_channels: Option<usize>,
}

impl Default for MemoryTransportConfig {
    fn default() -> Self {
        Self {
            slot_size: DEFAULT_SLOT_SIZE,
            slot_count: DEFAULT_SLOT_COUNT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_channels: None,
        }
    }
}

impl MemoryTransportConfig {
    fn validate(&self) -> Result<()> {
        if self.slot_size == 0 {
            return Err(Error::InvalidConfig("slot_size must be > 0".to_string()));
        }
        if self.slot_count == 0 {
            return Err(Error::InvalidConfig("slot_count must be > 0".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig("queue_capacity must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Handle to an in-process segment
///
/// Cloning yields another handle to the same segment.
#[derive(Clone)]
pub struct MemoryTransport {
    segment: Arc<Segment>,
}

impl MemoryTransport {
    /// Create a segment with the default sizing
    pub fn new() -> Self {
        Self::from_config(MemoryTransportConfig::default())
    }

    /// Create a builder for configuring the segment
    pub fn builder() -> MemoryTransportBuilder {
        MemoryTransportBuilder::new()
    }

    /// Create a segment from an explicit config
    pub fn with_config(config: MemoryTransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: MemoryTransportConfig) -> Self {
        tracing::debug!(
            slot_size = config.slot_size,
            slot_count = config.slot_count,
            queue_capacity = config.queue_capacity,
            "created memory segment"
        );
        Self {
            segment: Arc::new(Segment {
                pool: SlotPool::new(config.slot_size, config.slot_count),
                config,
                topics: RwLock::new(HashMap::new()),
                runtimes: RwLock::new(HashSet::new()),
                live_ports: AtomicUsize::new(0),
                online: AtomicBool::new(true),
            }),
        }
    }

    pub fn config(&self) -> &MemoryTransportConfig {
        &self.segment.config
    }

    /// Take the segment offline
    ///
    /// Every later registration, port construction, loan, publish and take fails
    /// with [`Error::Offline`].
    pub fn shutdown(&self) {
        if self.segment.online.swap(false, Ordering::SeqCst) {
            tracing::info!("memory segment shut down");
        }
    }

    pub fn is_online(&self) -> bool {
        self.segment.online.load(Ordering::SeqCst)
    }

    pub fn is_registered(&self, app_name: &str) -> bool {
        self.segment.runtimes.read().contains(app_name)
    }

    /// Slots currently available for loan
    pub fn free_slots(&self) -> usize {
        self.segment.pool.free_slots()
    }

    /// Publishers and subscribers currently alive
    pub fn live_ports(&self) -> usize {
        self.segment.live_ports.load(Ordering::SeqCst)
    }

    /// Live publishers on `address`
    pub fn publisher_count(&self, address: &ChannelAddress) -> usize {
        self.segment
            .topics
            .read()
            .get(address)
            .map_or(0, |topic| topic.publishers.load(Ordering::SeqCst))
    }

    /// Addresses with at least one live publisher or subscriber
    pub fn topic_count(&self) -> usize {
        self.segment.topics.read().len()
    }

    /// Live subscribers on `address`
    pub fn subscriber_count(&self, address: &ChannelAddress) -> usize {
        self.segment
            .topics
            .read()
            .get(address)
            .map_or(0, |topic| topic.live_subscribers())
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    type Publisher = MemoryPublisher;
    type Subscriber = MemorySubscriber;

    fn register(&self, app_name: &str) -> Result<()> {
        self.segment.ensure_online()?;
        if self.segment.runtimes.write().insert(app_name.to_string()) {
            tracing::debug!(app = app_name, "registered runtime");
        }
        Ok(())
    }

    fn create_publisher(&self, app_name: &str, address: &ChannelAddress) -> Result<MemoryPublisher> {
        let port = self.segment.open_port(app_name)?;
        let topic = self.segment.attach(address, |topic| {
            topic.publishers.fetch_add(1, Ordering::SeqCst);
        });
        tracing::debug!(app = app_name, %address, "created publisher");
        Ok(MemoryPublisher {
            address: address.clone(),
            topic,
            port,
        })
    }

    fn create_subscriber(&self, app_name: &str, address: &ChannelAddress) -> Result<MemorySubscriber> {
        let port = self.segment.open_port(app_name)?;
        let queue = Arc::new(Queue::new(self.segment.config.queue_capacity));
        let topic = self.segment.attach(address, |topic| {
            topic.subscribers.lock().push(Arc::downgrade(&queue));
        });
        tracing::debug!(app = app_name, %address, "created subscriber");
        Ok(MemorySubscriber {
            address: address.clone(),
            topic,
            queue,
            port,
        })
    }
}

/// Builder for configuring a memory segment
#[derive(Default)]
pub struct MemoryTransportBuilder {
    slot_size: Option<usize>,
    slot_count: Option<usize>,
    queue_capacity: Option<usize>,
    max_channels: Option<usize>,
}

impl MemoryTransportBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the size of each pool slot
    pub fn slot_size(mut self, bytes: usize) -> Self {
        self.slot_size = Some(bytes);
        self
    }

    /// Set the number of pool slots
    pub fn slot_count(mut self, count: usize) -> Self {
        self.slot_count = Some(count);
        self
    }

    /// Set the per-subscriber queue depth
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Cap the number of live ports
    pub fn max_channels(mut self, max: usize) -> Self {
        self.max_channels = Some(max);
        self
    }

    /// Build the segment with the configured settings
    pub fn build(self) -> Result<MemoryTransport> {
        let defaults = MemoryTransportConfig::default();
        MemoryTransport::with_config(MemoryTransportConfig {
            slot_size: self.slot_size.unwrap_or(defaults.slot_size),
            slot_count: self.slot_count.unwrap_or(defaults.slot_count),
            queue_capacity: self.queue_capacity.unwrap_or(defaults.queue_capacity),
            max_channels: self.max_channels,
        })
    }
}

struct Segment {
    config: MemoryTransportConfig,
    pool: Arc<SlotPool>,
    topics: RwLock<HashMap<ChannelAddress, Arc<Topic>>>,
    runtimes: RwLock<HashSet<String>>,
    live_ports: AtomicUsize,
    online: AtomicBool,
}

impl Segment {
    fn ensure_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Offline)
        }
    }

    fn open_port(self: &Arc<Self>, app_name: &str) -> Result<Port> {
        self.ensure_online()?;
        if !self.runtimes.read().contains(app_name) {
            return Err(Error::NotRegistered(app_name.to_string()));
        }

        let max = self.config.max_channels;
        self.live_ports
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match max {
                Some(max) if n >= max => None,
                _ => Some(n + 1),
            })
            .map_err(|_| Error::ChannelLimit {
                max: max.unwrap_or(usize::MAX),
            })?;

        Ok(Port {
            segment: Arc::clone(self),
        })
    }

    // `join` runs under the map lock so a concurrent `release` cannot remove
    // the topic between lookup and attachment.
    fn attach(&self, address: &ChannelAddress, join: impl FnOnce(&Topic)) -> Arc<Topic> {
        {
            let topics = self.topics.read();
            if let Some(topic) = topics.get(address) {
                join(&**topic);
                return Arc::clone(topic);
            }
        }
        let mut topics = self.topics.write();
        let topic = topics
            .entry(address.clone())
            .or_insert_with(|| Arc::new(Topic::default()));
        join(&**topic);
        Arc::clone(topic)
    }

    // Forgets `topic` once nothing publishes or subscribes on it.
    fn release(&self, address: &ChannelAddress, topic: &Arc<Topic>) {
        let mut topics = self.topics.write();
        let idle = match topics.get(address) {
            Some(current) => Arc::ptr_eq(current, topic) && topic.is_idle(),
            None => false,
        };
        if idle {
            topics.remove(address);
            tracing::trace!(%address, "removed idle topic");
        }
    }
}

// Counts against `max_channels` for as long as the owning port lives.
struct Port {
    segment: Arc<Segment>,
}

impl Drop for Port {
    fn drop(&mut self) {
        self.segment.live_ports.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Topic {
    publishers: AtomicUsize,
    subscribers: Mutex<Vec<Weak<Queue>>>,
}

impl Topic {
    fn deliver(&self, sample: Sample) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|queue| queue.strong_count() > 0);
        let mut delivered = 0;
        for queue in subscribers.iter().filter_map(Weak::upgrade) {
            queue.push(sample.clone());
            delivered += 1;
        }
        delivered
    }

    fn is_idle(&self) -> bool {
        self.publishers.load(Ordering::SeqCst) == 0 && self.live_subscribers() == 0
    }

    fn detach(&self, queue: &Arc<Queue>) {
        self.subscribers
            .lock()
            .retain(|weak| !std::ptr::eq(weak.as_ptr(), Arc::as_ptr(queue)));
    }

    fn live_subscribers(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|queue| queue.strong_count() > 0)
            .count()
    }
}

struct Queue {
    samples: Mutex<VecDeque<Sample>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    fn push(&self, sample: Sample) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.capacity {
            samples.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(capacity = self.capacity, "subscriber queue full, dropped oldest sample");
        }
        samples.push_back(sample);
    }

    fn pop(&self) -> Option<Sample> {
        self.samples.lock().pop_front()
    }
}

/// Publish port of a [`MemoryTransport`]
pub struct MemoryPublisher {
    address: ChannelAddress,
    topic: Arc<Topic>,
    port: Port,
}

impl Publisher for MemoryPublisher {
    fn address(&self) -> &ChannelAddress {
        &self.address
    }

    fn loan(&self) -> Result<LoanedSample> {
        self.port.segment.ensure_online()?;
        self.port.segment.pool.loan()
    }

    fn publish(&self, sample: LoanedSample) -> Result<()> {
        self.port.segment.ensure_online()?;
        let len = sample.len();
        let delivered = self.topic.deliver(sample.into_sample());
        tracing::trace!(address = %self.address, len, delivered, "published sample");
        Ok(())
    }
}

impl Drop for MemoryPublisher {
    fn drop(&mut self) {
        self.topic.publishers.fetch_sub(1, Ordering::SeqCst);
        self.port.segment.release(&self.address, &self.topic);
    }
}

/// Subscribe port of a [`MemoryTransport`]
pub struct MemorySubscriber {
    address: ChannelAddress,
    topic: Arc<Topic>,
    queue: Arc<Queue>,
    port: Port,
}

impl MemorySubscriber {
    /// Samples waiting to be taken
    pub fn pending(&self) -> usize {
        self.queue.samples.lock().len()
    }

    /// Samples discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for MemorySubscriber {
    fn drop(&mut self) {
        self.topic.detach(&self.queue);
        self.port.segment.release(&self.address, &self.topic);
    }
}

impl Subscriber for MemorySubscriber {
    fn address(&self) -> &ChannelAddress {
        &self.address
    }

    fn take(&self) -> Result<Option<Sample>> {
        self.port.segment.ensure_online()?;
        Ok(self.queue.pop())
    }
}
