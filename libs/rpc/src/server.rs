//! Server role: takes one request from the shared request channel, runs the
//! handler and publishes the reply on the sender's private response channel.
//!
//! A request that cannot be answered (no response channel, no free buffer,
//! handler declined) is dropped. The transport has no replay, so the client
//! only ever observes its own timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tether_core::{ChannelAddress, ClientId, Error, Result, ServiceTags};
use tether_fabric::{LoanedSample, MemoryTransport, Transport, TypedSubscriber};

use crate::config::PollConfig;
use crate::envelope::{Envelope, Reply};
use crate::registry::{ClientRegistry, ReplyPublisher};

/// Asynchronous request handler for [`DispatchLoop::serve_once_async`]
///
/// Returning `false` declines the request; nothing is published.
#[async_trait]
pub trait AsyncHandler<Req, Resp>: Send + Sync {
    async fn handle(&self, request: &Req, response: &mut Resp) -> bool;
}

/// Server half of a request/response pair
///
/// Safe to share between threads: every `serve_once` takes at most one
/// request, and all of them resolve response channels through one registry.
pub struct DispatchLoop<Req, Resp, T: Transport = MemoryTransport> {
    app_name: String,
    requests: TypedSubscriber<Envelope<Req>, T::Subscriber>,
    registry: ClientRegistry<T, Resp>,
    config: PollConfig,
}

impl<Req, Resp, T> DispatchLoop<Req, Resp, T>
where
    Req: DeserializeOwned,
    Resp: Serialize + Default,
    T: Transport,
{
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn tags(&self) -> &ServiceTags {
        self.registry.tags()
    }

    pub fn request_address(&self) -> &ChannelAddress {
        self.requests.address()
    }

    pub fn registry(&self) -> &ClientRegistry<T, Resp> {
        &self.registry
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Forget a client's response channel
    pub fn evict(&self, client_id: ClientId) -> bool {
        self.registry.remove(client_id)
    }

    /// Handle at most one request, waiting up to `timeout` for it to arrive
    ///
    /// `handler` fills the response; returning `false` declines and nothing is
    /// published. The queue is only read while `timeout` has not elapsed: a
    /// zero timeout returns [`Error::Timeout`] and leaves pending requests
    /// queued.
    pub fn serve_once<F>(&self, mut handler: F, timeout: Duration) -> Result<()>
    where
        F: FnMut(&Req, &mut Resp) -> bool,
    {
        let start = Instant::now();
        let envelope = loop {
            if start.elapsed() >= timeout {
                return Err(self.timed_out(timeout));
            }
            if let Some(envelope) = self.requests.take()? {
                break envelope;
            }
            std::thread::sleep(self.config.poll_interval);
        };

        let (publisher, sample) = self.prepare(&envelope)?;
        let mut response = Resp::default();
        if !handler(&envelope.payload, &mut response) {
            return Err(self.declined(&envelope));
        }
        self.reply(&publisher, sample, &envelope, response)
    }

    /// Like [`DispatchLoop::serve_once`], with an async handler and the tokio timer
    pub async fn serve_once_async<H>(&self, handler: &H, timeout: Duration) -> Result<()>
    where
        H: AsyncHandler<Req, Resp>,
        Req: Send + Sync,
        Resp: Send,
    {
        let start = tokio::time::Instant::now();
        let envelope = loop {
            if start.elapsed() >= timeout {
                return Err(self.timed_out(timeout));
            }
            if let Some(envelope) = self.requests.take()? {
                break envelope;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        };

        let (publisher, sample) = self.prepare(&envelope)?;
        let mut response = Resp::default();
        if !handler.handle(&envelope.payload, &mut response).await {
            return Err(self.declined(&envelope));
        }
        self.reply(&publisher, sample, &envelope, response)
    }

    // Resolves the sender's channel and loans the response buffer before the
    // handler runs.
    fn prepare(&self, envelope: &Envelope<Req>) -> Result<(Arc<ReplyPublisher<T, Resp>>, LoanedSample)> {
        let client_id = envelope.client_id;
        let publisher = self.registry.get_or_create(client_id).map_err(|e| {
            tracing::warn!(%client_id, sequence = envelope.sequence, "dropping request: {e}");
            e
        })?;
        let sample = publisher.loan().map_err(|e| {
            tracing::warn!(%client_id, sequence = envelope.sequence, error = %e, "dropping request: no response buffer");
            Error::from(e)
        })?;
        Ok((publisher, sample))
    }

    fn reply(
        &self,
        publisher: &ReplyPublisher<T, Resp>,
        sample: LoanedSample,
        envelope: &Envelope<Req>,
        response: Resp,
    ) -> Result<()> {
        let reply = Reply {
            sequence: envelope.sequence,
            payload: response,
        };
        publisher.publish(sample, &reply)?;
        tracing::trace!(client_id = %envelope.client_id, sequence = envelope.sequence, "published reply");
        Ok(())
    }

    fn declined(&self, envelope: &Envelope<Req>) -> Error {
        tracing::debug!(client_id = %envelope.client_id, sequence = envelope.sequence, "handler declined");
        Error::HandlerDeclined
    }

    fn timed_out(&self, timeout: Duration) -> Error {
        tracing::trace!(address = %self.requests.address(), ?timeout, "no request within timeout");
        Error::Timeout(timeout)
    }
}

/// Builder for configuring a [`DispatchLoop`]
pub struct DispatchLoopBuilder {
    tags: ServiceTags,
    app_name: Option<String>,
    config: Option<PollConfig>,
}

impl DispatchLoopBuilder {
    /// Create a new builder
    pub fn new(tags: ServiceTags) -> Self {
        Self {
            tags,
            app_name: None,
            config: None,
        }
    }

    /// Set the application name the loop registers under
    ///
    /// Defaults to `<request tag>-<response tag>`.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Set the polling behaviour
    pub fn poll_config(mut self, config: PollConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register with the transport and subscribe to the request channel
    pub fn build<Req, Resp, T>(self, transport: &T) -> Result<DispatchLoop<Req, Resp, T>>
    where
        Req: DeserializeOwned,
        Resp: Serialize + Default,
        T: Transport + Clone,
    {
        let app_name = self
            .app_name
            .unwrap_or_else(|| format!("{}-{}", self.tags.request, self.tags.response));
        transport.register(&app_name)?;

        let address = self.tags.request_channel();
        let requests = transport
            .create_subscriber(&app_name, &address)
            .map_err(|e| match Error::from(e) {
                Error::Uninitialized(msg) => Error::Uninitialized(msg),
                other => Error::ChannelCreationFailed(format!("{address}: {other}")),
            })?;
        tracing::debug!(app = %app_name, %address, "dispatch loop ready");

        Ok(DispatchLoop {
            registry: ClientRegistry::new(transport.clone(), app_name.clone(), self.tags),
            app_name,
            requests: TypedSubscriber::new(requests),
            config: self.config.unwrap_or_else(PollConfig::from_env),
        })
    }
}
