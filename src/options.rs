//! Options for the public entry points.

use std::fmt;
use std::str::FromStr;

use crate::error::JossError;

/// Default byte budget for one streaming encoder call.
pub const DEFAULT_CHUNK_SIZE: usize = 16384;

/// Default ceiling on the bytes a streaming decoder accepts (1 GiB).
pub const DEFAULT_MAX_LENGTH: usize = 1 << 30;

/// Byte order of typed-array payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// The byte order of the running platform.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    pub fn is_big(self) -> bool {
        self == Self::Big
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Little => "LE",
            Self::Big => "BE",
        }
    }
}

impl Default for Endian {
    fn default() -> Self {
        Self::native()
    }
}

impl FromStr for Endian {
    type Err = JossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LE" => Ok(Self::Little),
            "BE" => Ok(Self::Big),
            other => Err(JossError::InvalidOption(format!(
                "endian must be either \"LE\" or \"BE\", got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for `serialize` and `serializable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    endian: Endian,
    chunk_size: usize,
}

impl SerializeOptions {
    pub fn new() -> Self {
        Self {
            endian: Endian::native(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets the byte order written for typed-array payloads.
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Sets the approximate number of bytes a streaming encoder emits per call.
    pub fn chunk_size(mut self, size: usize) -> Result<Self, JossError> {
        if size == 0 {
            return Err(JossError::InvalidOption(
                "chunk size must be a positive integer".into(),
            ));
        }
        self.chunk_size = size;
        Ok(self)
    }

    pub fn get_endian(&self) -> Endian {
        self.endian
    }

    pub fn get_chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for `deserializable` and `deserializing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeserializeOptions {
    max_length: usize,
}

impl DeserializeOptions {
    pub fn new() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    /// Sets the maximum cumulative number of bytes a session accepts.
    pub fn max_length(mut self, limit: usize) -> Result<Self, JossError> {
        if limit == 0 {
            return Err(JossError::InvalidOption(
                "maxlength must be a positive integer".into(),
            ));
        }
        self.max_length = limit;
        Ok(self)
    }

    pub fn get_max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self::new()
    }
}
