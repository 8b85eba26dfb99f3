//! Client role: turns one publish plus a bounded poll into a synchronous call.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tether_core::{derive_identity, CallSite, ChannelAddress, ClientId, Error, Result, ServiceTags};
use tether_fabric::{MemoryTransport, Subscriber, Transport, TypedPublisher, TypedSubscriber};

use crate::config::PollConfig;
use crate::envelope::{Envelope, Reply};

/// Application name used when the builder is not given one
pub const DEFAULT_CLIENT_APP: &str = "tether-client";

/// Client half of a request/response pair
///
/// Owns a publisher on the shared request channel and a subscriber on its own
/// response channel. Each call publishes at most one envelope and is never
/// retried internally.
pub struct CallDriver<Req, Resp, T: Transport = MemoryTransport> {
    client_id: ClientId,
    tags: ServiceTags,
    requests: TypedPublisher<Envelope<Req>, T::Publisher>,
    replies: TypedSubscriber<Reply<Resp>, T::Subscriber>,
    sequence: u64,
    config: PollConfig,
}

impl<Req, Resp, T> CallDriver<Req, Resp, T>
where
    Req: Serialize,
    Resp: DeserializeOwned,
    T: Transport,
{
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn tags(&self) -> &ServiceTags {
        &self.tags
    }

    pub fn request_address(&self) -> &ChannelAddress {
        self.requests.address()
    }

    pub fn response_address(&self) -> &ChannelAddress {
        self.replies.address()
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Publish `request` and wait up to `timeout` for the matching reply
    ///
    /// The reply queue is only polled while `timeout` has not elapsed, so a
    /// zero timeout publishes and then fails with [`Error::Timeout`].
    pub fn call(&mut self, request: Req, timeout: Duration) -> Result<Resp> {
        let sequence = self.publish(request)?;
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Some(response) = self.poll_reply(sequence)? {
                return Ok(response);
            }
            std::thread::sleep(self.config.poll_interval);
        }
        Err(self.timed_out(sequence, timeout))
    }

    /// [`CallDriver::call`] with the configured default timeout
    pub fn call_default(&mut self, request: Req) -> Result<Resp> {
        let timeout = self.config.default_timeout;
        self.call(request, timeout)
    }

    /// Publish `request` without waiting for a reply
    ///
    /// Success means the envelope was handed to the transport, not that any
    /// server received it. The reply a server sends back is discarded the
    /// next time this driver publishes.
    pub fn send(&mut self, request: Req) -> Result<()> {
        self.publish(request).map(|_| ())
    }

    /// Call with an optional reply callback
    ///
    /// With no callback this is [`CallDriver::send`]; otherwise the reply is
    /// awaited and passed to `on_reply`.
    pub fn call_with<F>(&mut self, request: Req, on_reply: Option<F>, timeout: Duration) -> Result<()>
    where
        F: FnOnce(&Resp),
    {
        match on_reply {
            None => self.send(request),
            Some(on_reply) => {
                let response = self.call(request, timeout)?;
                on_reply(&response);
                Ok(())
            }
        }
    }

    /// Like [`CallDriver::call`], but sleeps on the tokio timer between polls
    pub async fn call_async(&mut self, request: Req, timeout: Duration) -> Result<Resp> {
        let sequence = self.publish(request)?;
        let start = tokio::time::Instant::now();
        while start.elapsed() < timeout {
            if let Some(response) = self.poll_reply(sequence)? {
                return Ok(response);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        Err(self.timed_out(sequence, timeout))
    }

    fn publish(&mut self, request: Req) -> Result<u64> {
        // Nothing waits on replies queued before this request.
        self.discard_pending()?;

        self.sequence = self.sequence.wrapping_add(1);
        let envelope = Envelope {
            client_id: self.client_id,
            sequence: self.sequence,
            payload: request,
        };

        let sample = self.requests.loan().map_err(|e| {
            tracing::debug!(client_id = %self.client_id, error = %e, "failed to loan request buffer");
            Error::from(e)
        })?;
        self.requests.publish(sample, &envelope)?;
        tracing::trace!(client_id = %self.client_id, sequence = envelope.sequence, "published request");
        Ok(envelope.sequence)
    }

    // Drains replies until the one for `sequence`; anything older is stale.
    fn poll_reply(&self, sequence: u64) -> Result<Option<Resp>> {
        while let Some(reply) = self.replies.take()? {
            if reply.sequence == sequence {
                return Ok(Some(reply.payload));
            }
            tracing::debug!(
                client_id = %self.client_id,
                expected = sequence,
                received = reply.sequence,
                "discarded stale reply"
            );
        }
        Ok(None)
    }

    fn discard_pending(&self) -> Result<()> {
        let mut discarded = 0usize;
        while self.replies.port().take()?.is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            tracing::trace!(client_id = %self.client_id, discarded, "discarded unawaited replies");
        }
        Ok(())
    }

    fn timed_out(&self, sequence: u64, timeout: Duration) -> Error {
        tracing::debug!(client_id = %self.client_id, sequence, ?timeout, "timed out waiting for reply");
        Error::Timeout(timeout)
    }
}

/// Builder for configuring a [`CallDriver`]
pub struct CallDriverBuilder {
    tags: ServiceTags,
    app_name: Option<String>,
    call_site: Option<CallSite>,
    client_id: Option<ClientId>,
    config: Option<PollConfig>,
}

impl CallDriverBuilder {
    /// Create a new builder
    pub fn new(tags: ServiceTags) -> Self {
        Self {
            tags,
            app_name: None,
            call_site: None,
            client_id: None,
            config: None,
        }
    }

    /// Set the application name the driver registers under
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Set the call site the identity is derived from
    pub fn call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = Some(call_site);
        self
    }

    /// Use an explicit identity instead of deriving one
    ///
    /// Two drivers sharing an identity share a response channel and may
    /// receive each other's replies.
    pub fn client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Set the polling behaviour
    pub fn poll_config(mut self, config: PollConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register with the transport and open both channels
    pub fn build<Req, Resp, T>(self, transport: &T) -> Result<CallDriver<Req, Resp, T>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        T: Transport,
    {
        let app_name = self.app_name.unwrap_or_else(|| DEFAULT_CLIENT_APP.to_string());
        let client_id = match (self.client_id, &self.call_site) {
            (Some(client_id), _) => client_id,
            (None, Some(call_site)) => {
                derive_identity(&app_name, call_site, &self.tags.request, &self.tags.response)
            }
            (None, None) => return Err(Error::custom("Call site or client id not set")),
        };

        transport.register(&app_name)?;

        // Subscribe first so no reply can be published before we listen.
        let response_address = self.tags.response_channel(client_id);
        let replies = transport
            .create_subscriber(&app_name, &response_address)
            .map_err(|e| channel_error(&response_address, e))?;
        let request_address = self.tags.request_channel();
        let requests = transport
            .create_publisher(&app_name, &request_address)
            .map_err(|e| channel_error(&request_address, e))?;

        tracing::debug!(
            app = %app_name,
            %client_id,
            call_site = ?self.call_site.as_ref().map(ToString::to_string),
            "call driver ready"
        );

        Ok(CallDriver {
            client_id,
            tags: self.tags,
            requests: TypedPublisher::new(requests),
            replies: TypedSubscriber::new(replies),
            sequence: initial_sequence(),
            config: self.config.unwrap_or_else(PollConfig::from_env),
        })
    }
}

fn channel_error(address: &ChannelAddress, err: tether_fabric::Error) -> Error {
    match Error::from(err) {
        Error::Uninitialized(msg) => Error::Uninitialized(msg),
        other => Error::ChannelCreationFailed(format!("{address}: {other}")),
    }
}

// Clock seed: a relaunched client never matches replies meant for its
// previous incarnation.
fn initial_sequence() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
