//! Format descriptor: the target version and the code capability.

use crate::error::EncodeError;
use crate::limits::{
    CURRENT_VERSION, MIN_BINARY_FLOAT_VERSION, MIN_COMPACT_VERSION, MIN_INTERNED_VERSION,
    MIN_REF_VERSION, MIN_SLICE_VERSION,
};

/// Options fixed for one encode call.
///
/// The version is not written to the stream; the enclosing container is
/// expected to carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    version: u8,
    allow_code: bool,
}

impl Default for FormatDescriptor {
    fn default() -> Self {
        Self::current()
    }
}

impl FormatDescriptor {
    /// Creates a descriptor for `version` with procedure records disallowed.
    pub fn new(version: u8) -> Result<Self, EncodeError> {
        if version > CURRENT_VERSION {
            return Err(EncodeError::UnsupportedVersion { version });
        }
        Ok(Self {
            version,
            allow_code: false,
        })
    }

    /// Descriptor for the newest version.
    pub fn current() -> Self {
        Self {
            version: CURRENT_VERSION,
            allow_code: false,
        }
    }

    /// Sets whether procedure records may be written.
    pub fn with_allow_code(mut self, allow_code: bool) -> Self {
        self.allow_code = allow_code;
        self
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn allow_code(&self) -> bool {
        self.allow_code
    }

    /// Shared objects are flagged and repeated as back-references.
    pub fn tracks_references(&self) -> bool {
        self.version >= MIN_REF_VERSION
    }

    pub fn has_interned_text(&self) -> bool {
        self.version >= MIN_INTERNED_VERSION
    }

    /// ASCII text forms and the one-byte tuple count.
    pub fn has_compact_forms(&self) -> bool {
        self.version >= MIN_COMPACT_VERSION
    }

    pub fn has_binary_floats(&self) -> bool {
        self.version >= MIN_BINARY_FLOAT_VERSION
    }

    pub fn has_slices(&self) -> bool {
        self.version >= MIN_SLICE_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_gates() {
        let v0 = FormatDescriptor::new(0).unwrap();
        assert!(!v0.has_binary_floats());
        assert!(!v0.has_interned_text());
        assert!(!v0.tracks_references());

        let v3 = FormatDescriptor::new(3).unwrap();
        assert!(v3.tracks_references());
        assert!(!v3.has_compact_forms());

        let v4 = FormatDescriptor::new(4).unwrap();
        assert!(v4.has_compact_forms());
        assert!(!v4.has_slices());

        assert!(FormatDescriptor::current().has_slices());
    }

    #[test]
    fn test_rejects_future_version() {
        assert_eq!(
            FormatDescriptor::new(6),
            Err(EncodeError::UnsupportedVersion { version: 6 })
        );
    }

    #[test]
    fn test_code_disallowed_by_default() {
        assert!(!FormatDescriptor::current().allow_code());
        assert!(FormatDescriptor::current().with_allow_code(true).allow_code());
    }
}
