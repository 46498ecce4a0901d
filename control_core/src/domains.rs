use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Capability domains a controller can hold authority over.
    ///
    /// The named bits are conveniences for hosts; any other bit is carried
    /// through untouched and arbitrated exactly like the named ones.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ControlDomains: u32 {
        const MOVEMENT = 1 << 0;
        const WEAPONS = 1 << 1;
        const SENSORS = 1 << 2;
        const BEHAVIOR = 1 << 3;
        const PRODUCTION = 1 << 4;

        const _ = !0;
    }
}

impl Default for ControlDomains {
    fn default() -> Self {
        Self::empty()
    }
}

impl ControlDomains {
    /// Build a mask from raw bits without discarding unnamed domains.
    pub fn from_raw(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }

    /// Iterate the set bits one at a time, lowest bit first.
    pub fn single_bits(self) -> DomainBits {
        DomainBits {
            remaining: self.bits(),
        }
    }

    pub fn is_single_bit(self) -> bool {
        self.bits().count_ones() == 1
    }
}

/// Lowest-set-bit walk over a [`ControlDomains`] mask.
#[derive(Debug, Clone)]
pub struct DomainBits {
    remaining: u32,
}

impl Iterator for DomainBits {
    type Item = ControlDomains;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let bit = self.remaining & self.remaining.wrapping_neg();
        self.remaining &= !bit;
        Some(ControlDomains::from_bits_retain(bit))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.remaining.count_ones() as usize;
        (count, Some(count))
    }
}

impl ExactSizeIterator for DomainBits {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bits_walks_lowest_first() {
        let mask = ControlDomains::WEAPONS | ControlDomains::MOVEMENT | ControlDomains::from_raw(1 << 20);
        let bits: Vec<u32> = mask.single_bits().map(|bit| bit.bits()).collect();
        assert_eq!(bits, vec![1, 2, 1 << 20]);
    }

    #[test]
    fn unnamed_bits_are_retained() {
        let mask = ControlDomains::from_raw(0x8000_0001);
        assert_eq!(mask.bits(), 0x8000_0001);
        assert!(mask.contains(ControlDomains::MOVEMENT));
        assert_eq!(mask.single_bits().len(), 2);
    }

    #[test]
    fn empty_mask_yields_nothing() {
        assert_eq!(ControlDomains::empty().single_bits().count(), 0);
        assert!(!ControlDomains::empty().is_single_bit());
        assert!(ControlDomains::SENSORS.is_single_bit());
    }
}
