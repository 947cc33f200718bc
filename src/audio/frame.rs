use std::fmt;
use std::ops::BitOr;

/// Interleaved audio sample, nominally in [-1.0, 1.0]
pub type Sample = f32;

/// Frame content flags
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Contains samples decoded from packets
    pub const NONBLANK: Self = Self(1 << 0);
    /// Contains concealment for missing data after playback started
    pub const INCOMPLETE: Self = Self(1 << 1);
    /// Late packets were dropped while producing this frame
    pub const DROPS: Self = Self(1 << 2);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for FrameFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for FrameFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Self::NONBLANK) {
            parts.push("NONBLANK");
        }
        if self.contains(Self::INCOMPLETE) {
            parts.push("INCOMPLETE");
        }
        if self.contains(Self::DROPS) {
            parts.push("DROPS");
        }
        write!(f, "FrameFlags({})", parts.join("|"))
    }
}

/// A fixed-size view of interleaved samples being filled by a reader
pub struct Frame<'a> {
    samples: &'a mut [Sample],
    flags: FrameFlags,
}

impl<'a> Frame<'a> {
    pub fn new(samples: &'a mut [Sample]) -> Self {
        Self {
            samples,
            flags: FrameFlags::empty(),
        }
    }

    pub fn samples(&self) -> &[Sample] {
        self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [Sample] {
        self.samples
    }

    /// Total interleaved samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: FrameFlags) {
        self.flags = flags;
    }

    pub fn add_flags(&mut self, flags: FrameFlags) {
        self.flags.insert(flags);
    }
}
