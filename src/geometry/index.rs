//! Index types for trace geometry.
//!
//! Two kinds of identifiers are used throughout the crate:
//! - [`Marker`] ties a trace bit to its originating geometry sample. Markers are
//!   stable across every edit, so renderers can keep their own primitives keyed
//!   by marker.
//! - [`LineId`] names a trace line. Lines are created and destroyed by edits,
//!   and ids are never reused within a forest.

use std::fmt::{self, Debug, Display};

use serde::{Deserialize, Serialize};

/// A stable geometry sample identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Marker(u32);

/// A trace line identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct LineId(u32);

macro_rules! impl_id_type {
    ($name:ident, $display:literal) => {
        impl $name {
            /// Create a new id from a raw index.
            ///
            /// # Panics
            /// Panics in debug builds if the index does not fit in 32 bits.
            #[inline]
            pub fn new(index: usize) -> Self {
                debug_assert!(index <= u32::MAX as usize, "index {} too large for u32", index);
                Self(index as u32)
            }

            /// Get the raw index value.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// Get the raw value of the underlying type.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $display, self.0)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<usize> for $name {
            fn from(v: usize) -> Self {
                Self::new(v)
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                Self(v)
            }
        }
    };
}

impl_id_type!(Marker, "M");
impl_id_type!(LineId, "L");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_roundtrip() {
        let m = Marker::new(42);
        assert_eq!(m.index(), 42);
        assert_eq!(m.raw(), 42);
        assert_eq!(Marker::from(42u32), m);
    }

    #[test]
    fn test_debug_and_display() {
        assert_eq!(format!("{:?}", Marker::new(7)), "M(7)");
        assert_eq!(format!("{:?}", LineId::new(3)), "L(3)");
        assert_eq!(LineId::new(3).to_string(), "3");
    }

    #[test]
    fn test_ordering_follows_index() {
        let mut ids = vec![LineId::new(5), LineId::new(1), LineId::new(3)];
        ids.sort();
        assert_eq!(ids, vec![LineId::new(1), LineId::new(3), LineId::new(5)]);
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&Marker::new(9)).unwrap();
        assert_eq!(json, "9");
        let back: LineId = serde_json::from_str("12").unwrap();
        assert_eq!(back, LineId::new(12));
    }
}
