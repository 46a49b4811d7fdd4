use std::fmt;

pub const VALID: u64 = 1 << 0;
pub const DIRTY: u64 = 1 << 1;
const FLAG_BITS: u32 = 2;

/// One way's tag slot packed into a single word: bit 0 is VALID, bit 1 is
/// DIRTY and the bits above hold the line address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TagEntry(u64);

impl TagEntry {
    pub const INVALID: TagEntry = TagEntry(0);

    /// Freshly filled, clean slot holding `line_addr`.
    pub fn fill(line_addr: u64) -> Self {
        TagEntry((line_addr << FLAG_BITS) | VALID)
    }

    pub fn from_bits(bits: u64) -> Self {
        TagEntry(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 & VALID != 0
    }

    pub fn is_dirty(self) -> bool {
        self.0 & DIRTY != 0
    }

    pub fn line_addr(self) -> u64 {
        self.0 >> FLAG_BITS
    }

    pub fn mark_dirty(&mut self) {
        self.0 |= DIRTY;
    }

    /// Tag and VALID must both match; DIRTY is ignored.
    pub fn matches(self, line_addr: u64) -> bool {
        self.0 & !DIRTY == Self::fill(line_addr).0
    }

    pub fn needs_writeback(self) -> bool {
        self.0 & (VALID | DIRTY) == VALID | DIRTY
    }
}

impl fmt::Debug for TagEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("TagEntry(invalid)");
        }
        write!(
            f,
            "TagEntry({:#x}{})",
            self.line_addr(),
            if self.is_dirty() { ", dirty" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_sets_valid_only() {
        let entry = TagEntry::fill(0x41);
        assert_eq!(entry.bits(), (0x41 << 2) | VALID);
        assert!(entry.is_valid());
        assert!(!entry.is_dirty());
        assert_eq!(entry.line_addr(), 0x41);
    }

    #[test]
    fn dirty_does_not_affect_matching() {
        let mut entry = TagEntry::fill(7);
        entry.mark_dirty();
        assert!(entry.is_dirty());
        assert!(entry.matches(7));
        assert!(!entry.matches(6));
        assert!(entry.needs_writeback());
    }

    #[test]
    fn adjacent_lines_do_not_alias() {
        assert!(!TagEntry::fill(4).matches(5));
        assert!(!TagEntry::fill(5).matches(4));
    }

    #[test]
    fn invalid_slot_never_matches() {
        assert!(!TagEntry::INVALID.matches(0));
        assert!(!TagEntry::INVALID.needs_writeback());
        // dirty without valid is not a writeback candidate
        assert!(!TagEntry::from_bits(DIRTY).needs_writeback());
    }
}
