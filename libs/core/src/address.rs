//! Channel addressing.
//!
//! Every pub/sub topic is addressed by a triple of request tag, response tag
//! and instance tag. Tags are supplied explicitly by the application so that
//! they stay identical across builds and processes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::ClientId;

/// Maximum length of a tag, in bytes.
pub const MAX_TAG_LEN: usize = 100;

/// Stable name of a payload type
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeTag(String);

impl TypeTag {
    /// Validate and wrap a tag.
    ///
    /// Tags must be non-empty, at most [`MAX_TAG_LEN`] bytes, and free of
    /// control characters.
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(Error::InvalidTag("tag is empty".to_string()));
        }
        if tag.len() > MAX_TAG_LEN {
            return Err(Error::InvalidTag(format!(
                "tag is {} bytes, max {}",
                tag.len(),
                MAX_TAG_LEN
            )));
        }
        if tag.chars().any(char::is_control) {
            return Err(Error::InvalidTag(format!("{tag:?} contains control characters")));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TypeTag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TypeTag> for String {
    fn from(tag: TypeTag) -> Self {
        tag.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The request/response tag pair a driver or dispatch loop is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceTags {
    pub request: TypeTag,
    pub response: TypeTag,
}

impl ServiceTags {
    pub fn new(request: impl Into<String>, response: impl Into<String>) -> Result<Self> {
        Ok(Self {
            request: TypeTag::new(request)?,
            response: TypeTag::new(response)?,
        })
    }

    /// Address of the shared request channel for this pair.
    pub fn request_channel(&self) -> ChannelAddress {
        ChannelAddress {
            request: self.request.clone(),
            response: self.response.clone(),
            instance: self.request.as_str().to_string(),
        }
    }

    /// Address of the private response channel of `client`.
    pub fn response_channel(&self, client: ClientId) -> ChannelAddress {
        ChannelAddress {
            request: self.request.clone(),
            response: self.response.clone(),
            instance: client.to_string(),
        }
    }
}

/// Address of a pub/sub topic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelAddress {
    pub request: TypeTag,
    pub response: TypeTag,
    pub instance: String,
}

impl ChannelAddress {
    /// Returns `true` if this is the shared request channel of its pair.
    pub fn is_request_channel(&self) -> bool {
        self.instance == self.request.as_str()
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.request, self.response, self.instance)
    }
}
