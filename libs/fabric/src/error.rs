use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Pool exhausted: all {capacity} slots are loaned")]
    PoolExhausted { capacity: usize },

    #[error("Channel limit reached: {max} ports")]
    ChannelLimit { max: usize },

    #[error("Runtime not registered: {0}")]
    NotRegistered(String),

    #[error("Transport is offline")]
    Offline,

    #[error("Payload too large: {size} bytes, slot holds {capacity}")]
    PayloadTooLarge { size: usize, capacity: usize },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for tether_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::PoolExhausted { .. } => Self::ResourceExhausted(err.to_string()),
            Error::ChannelLimit { .. } => Self::ChannelCreationFailed(err.to_string()),
            Error::NotRegistered(_) | Error::Offline => Self::Uninitialized(err.to_string()),
            Error::PayloadTooLarge { .. } | Error::Codec(_) => Self::Codec(err.to_string()),
            Error::InvalidConfig(msg) => Self::Custom(msg),
        }
    }
}
