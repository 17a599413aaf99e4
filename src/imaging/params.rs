//! Parameter types for the codec.
//!
//! - [`Quality`]: lossy encoding quality (0–100, default 80). Clamped on construction.

use serde::{Deserialize, Serialize};

/// Quality setting for WebP encoding (0-100).
///
/// Values above 100 are clamped to 100 rather than rejected, so a stale or
/// hand-edited request can never make a conversion fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality(u32);

impl Quality {
    pub const MAX: u32 = 100;

    pub fn new(value: u32) -> Self {
        Self(value.min(Self::MAX))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 0);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(100).value(), 100);
        assert_eq!(Quality::new(150).value(), 100);
        assert_eq!(Quality::new(u32::MAX).value(), 100);
    }

    #[test]
    fn quality_default_is_80() {
        assert_eq!(Quality::default().value(), 80);
    }
}
