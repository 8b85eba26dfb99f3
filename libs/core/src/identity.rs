//! Client identity derivation.
//!
//! A [`ClientId`] names the private response channel of one call driver. It is
//! a pure function of the application name, the call site that built the
//! driver, and the two payload tags, so a client relaunched from the same call
//! site reconnects to the same logical response channel.
//!
//! The hash is FNV-1a over length-prefixed fields followed by a 64-bit
//! finalizer. It is not collision-free: two drivers that collide share a
//! response channel and can receive each other's replies. Use an explicit
//! identity override when that risk is unacceptable.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::TypeTag;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable 64-bit identity of one logical client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(u64);

impl ClientId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ClientId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Decimal form, used verbatim as the response channel instance tag.
impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source location (or any stable token) that constructed a call driver.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallSite {
    file: Cow<'static, str>,
    line: u32,
}

impl CallSite {
    /// Call site from a file name and line number
    pub fn new(file: impl Into<Cow<'static, str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Call site from an arbitrary stable token
    pub fn token(token: impl Into<Cow<'static, str>>) -> Self {
        Self::new(token, 0)
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Captures the invoking file and line as a [`CallSite`].
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(::core::file!(), ::core::line!())
    };
}

/// Derive the identity of a client from its construction context.
///
/// Deterministic across process restarts and platforms.
pub fn derive_identity(
    app_name: &str,
    call_site: &CallSite,
    request_tag: &TypeTag,
    response_tag: &TypeTag,
) -> ClientId {
    let mut hasher = Fnv1a::new();
    hasher.field(app_name.as_bytes());
    hasher.field(call_site.file().as_bytes());
    hasher.field(&call_site.line().to_le_bytes());
    hasher.field(request_tag.as_str().as_bytes());
    hasher.field(response_tag.as_str().as_bytes());
    ClientId(hasher.finish())
}

struct Fnv1a(u64);

impl Fnv1a {
    fn new() -> Self {
        Self(FNV_OFFSET)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    // Length prefix keeps ("ab", "c") and ("a", "bc") apart.
    fn field(&mut self, bytes: &[u8]) {
        self.write(&(bytes.len() as u64).to_le_bytes());
        self.write(bytes);
    }

    fn finish(&self) -> u64 {
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}
