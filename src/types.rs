// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Replicate Statistics Engine - Type Definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

// ─── Output Selector ────────────────────────────────────────────────────────

/// Bitmask choosing which facets of a metric are written by `save`.
///
/// Bit values are fixed so selector masks stored in existing run
/// configurations keep their meaning.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct OutputFlags(u32);

impl OutputFlags {
    pub const NONE: Self = Self(0);
    /// Statistics broken down by year.
    pub const OUT_YEAR: Self = Self(0x1);
    /// Statistics broken down by replicate.
    pub const OUT_REP: Self = Self(0x2);
    /// Row labels laid out for loading into analysis tooling.
    pub const OUT_FORMAT: Self = Self(0x4);
    pub const OUT_NUM: Self = Self(0x10);
    pub const OUT_MEAN: Self = Self(0x20);
    pub const OUT_STD_DEV: Self = Self(0x40);
    pub const OUT_MIN: Self = Self(0x80);
    pub const OUT_MAX: Self = Self(0x100);
    /// Accepted for compatibility; aggregators carry no histogram data.
    pub const OUT_HIST: Self = Self(0x200);
    /// Emit `<title>.txt`, the year x rep sum table.
    pub const OUT_DATA: Self = Self(0x400);
    /// Capture every observation and emit `<title>Events.txt`.
    pub const OUT_EVENTS: Self = Self(0x800);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when at least one bit of `other` is set.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn captures_events(self) -> bool {
        self.contains(Self::OUT_EVENTS)
    }

    pub fn wants_summary(self) -> bool {
        self.intersects(Self::OUT_YEAR.union(Self::OUT_REP))
    }
}

impl BitOr for OutputFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for OutputFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for OutputFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for OutputFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

// ─── Aggregation Axis ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Axis {
    Year,
    Rep,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year => write!(f, "year"),
            Self::Rep => write!(f, "replicate"),
        }
    }
}
