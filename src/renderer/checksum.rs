//! Change checksums chained down the widget tree.
//!
//! A widget's checksum folds its own identity and version counter into its
//! parent's checksum. Bumping any ancestor, or moving a widget under a
//! different ancestor, changes the checksum of every widget below it.
//! Cached clip classifications are keyed on this value.

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Rolling FNV-1a hash over a chain of version counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(u64);

impl Checksum {
    /// Starting value for a tree root.
    pub const SEED: Checksum = Checksum(FNV_OFFSET);

    /// Fold one version counter into the running checksum.
    ///
    /// Order-sensitive: `a.combine(x).combine(y) != a.combine(y).combine(x)`
    /// for distinct `x` and `y` in all but pathological cases.
    #[inline]
    pub fn combine(self, version: u64) -> Checksum {
        let mut hash = self.0;
        for byte in version.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        Checksum(hash)
    }

    /// Checksum of a child node with the given identity and version.
    #[inline]
    pub fn child(self, identity: u64, version: u64) -> Checksum {
        self.combine(identity).combine(version)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::SEED
    }
}
