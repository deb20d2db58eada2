//! Transaction tags
//!
//! Tags are name/value byte strings attached to a transaction. They are
//! carried base64url encoded on the wire and enter the signature as raw bytes.

use serde::{Deserialize, Serialize};

use crate::encoding::{b64url_decode, b64url_encode};
use crate::error::Result;

/// Tag naming the MIME type of the transaction data.
pub const CONTENT_TYPE_TAG: &str = "Content-Type";

/// A single transaction tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Raw tag name.
    pub name: Vec<u8>,
    /// Raw tag value.
    pub value: Vec<u8>,
}

impl Tag {
    /// Creates a tag from a name and value.
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A `Content-Type` tag.
    pub fn content_type(mime: &str) -> Self {
        Self::new(CONTENT_TYPE_TAG, mime)
    }

    /// Name as UTF-8, if it is.
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.name).ok()
    }

    /// Value as UTF-8, if it is.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// Wire form of a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireTag {
    pub(crate) name: String,
    pub(crate) value: String,
}

impl From<&Tag> for WireTag {
    fn from(tag: &Tag) -> Self {
        Self {
            name: b64url_encode(&tag.name),
            value: b64url_encode(&tag.value),
        }
    }
}

impl TryFrom<WireTag> for Tag {
    type Error = crate::error::TxError;

    fn try_from(wire: WireTag) -> Result<Self> {
        Ok(Self {
            name: b64url_decode("tags.name", &wire.name)?,
            value: b64url_decode("tags.value", &wire.value)?,
        })
    }
}
