//! Defines the error type for lookups that require a key to be present.

use displaydoc::Display;

/// key not found in tree
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub struct KeyError;

#[cfg(feature = "std")]
impl std::error::Error for KeyError {}
