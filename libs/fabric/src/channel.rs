use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tether_core::ChannelAddress;

use crate::codec::{BincodeCodec, Codec};
use crate::error::Result;
use crate::pool::LoanedSample;
use crate::transport::{Publisher, Subscriber};

/// Typed publish channel
///
/// Combines a publish port and codec, encoding records straight into loaned slots.
pub struct TypedPublisher<T, P, C = BincodeCodec> {
    port: P,
    codec: C,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Serialize, P: Publisher> TypedPublisher<T, P> {
    pub fn new(port: P) -> Self {
        Self::with_codec(port, BincodeCodec)
    }
}

impl<T: Serialize, P: Publisher, C: Codec> TypedPublisher<T, P, C> {
    pub fn with_codec(port: P, codec: C) -> Self {
        Self {
            port,
            codec,
            _marker: PhantomData,
        }
    }

    pub fn address(&self) -> &ChannelAddress {
        self.port.address()
    }

    /// Acquire a slot now and fill it later with [`TypedPublisher::publish`]
    pub fn loan(&self) -> Result<LoanedSample> {
        self.port.loan()
    }

    /// Encode `value` into a previously loaned slot and publish it
    pub fn publish(&self, mut sample: LoanedSample, value: &T) -> Result<()> {
        let written = self.codec.encode_into(value, sample.as_mut_slice())?;
        sample.set_len(written)?;
        self.port.publish(sample)
    }

    /// Loan, encode and publish in one step
    pub fn send(&self, value: &T) -> Result<()> {
        let sample = self.loan()?;
        self.publish(sample, value)
    }
}

/// Typed subscribe channel
pub struct TypedSubscriber<T, S, C = BincodeCodec> {
    port: S,
    codec: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned, S: Subscriber> TypedSubscriber<T, S> {
    pub fn new(port: S) -> Self {
        Self::with_codec(port, BincodeCodec)
    }
}

impl<T: DeserializeOwned, S: Subscriber, C: Codec> TypedSubscriber<T, S, C> {
    pub fn with_codec(port: S, codec: C) -> Self {
        Self {
            port,
            codec,
            _marker: PhantomData,
        }
    }

    pub fn address(&self) -> &ChannelAddress {
        self.port.address()
    }

    /// Take and decode the oldest queued record without blocking
    pub fn take(&self) -> Result<Option<T>> {
        match self.port.take()? {
            Some(sample) => self.codec.decode(&sample).map(Some),
            None => Ok(None),
        }
    }

    /// Borrow the underlying port
    pub fn port(&self) -> &S {
        &self.port
    }
}
