use crate::error::{GraphError, Result};

/// First id past the 31-bit picking space. Id 0 means "nothing".
pub const ID_SPACE_END: u32 = 1 << 31;

/// Half-open id range `[start, end)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PickingRange {
    pub start: u32,
    pub end: u32,
}

impl PickingRange {
    #[inline]
    pub fn len(self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }

    #[inline]
    pub fn contains(self, id: u32) -> bool {
        (self.start..self.end).contains(&id)
    }
}

/// Encodes a picking id as the color the picking pass renders.
///
/// The low bit is forced to 1 so a hit never decodes with zero alpha.
#[inline]
pub fn encode_color(id: u32) -> [u8; 4] {
    ((id << 1) | 1).to_le_bytes()
}

/// The pixel the picking pass writes for an id: the buffer word with its
/// channels reversed, low byte in alpha.
#[inline]
pub fn rendered_pixel(id: u32) -> [u8; 4] {
    let [a, b, c, d] = encode_color(id);
    [d, c, b, a]
}

/// Decodes a picking-target pixel. The picking shader writes the low byte
/// of the encoded value into alpha, so `rgba` reads most significant first.
#[inline]
pub fn decode_pixel(rgba: [u8; 4]) -> Option<u32> {
    let value = u32::from_be_bytes(rgba);
    if value & 1 == 0 {
        return None;
    }
    match value >> 1 {
        0 => None,
        id => Some(id),
    }
}

/// Ids handed out by one [`PickingAllocator::allocate`] call.
///
/// Slot `i` (the i-th allocated entity) maps to the i-th id across `ranges`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PickingAllocation {
    ranges: Vec<PickingRange>,
    count: u32,
}

impl PickingAllocation {
    pub fn ranges(&self) -> &[PickingRange] {
        &self.ranges
    }

    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn id(&self, slot: u32) -> Option<u32> {
        let mut base = 0;
        for r in &self.ranges {
            if slot < base + r.len() {
                return Some(r.start + (slot - base));
            }
            base += r.len();
        }
        None
    }

    pub fn slot_of(&self, id: u32) -> Option<u32> {
        let mut base = 0;
        for r in &self.ranges {
            if r.contains(id) {
                return Some(base + (id - r.start));
            }
            base += r.len();
        }
        None
    }

    pub fn color(&self, slot: u32) -> Option<[u8; 4]> {
        self.id(slot).map(encode_color)
    }

    /// One RGBA quad per slot, in slot order.
    pub fn color_buffer(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.count as usize * 4);
        for r in &self.ranges {
            for id in r.start..r.end {
                out.extend_from_slice(&encode_color(id));
            }
        }
        out
    }
}

/// Free list over the 31-bit picking id space.
///
/// Free ranges are kept sorted and never overlap.
#[derive(Debug, Clone)]
pub struct PickingAllocator {
    free: Vec<PickingRange>,
}

impl Default for PickingAllocator {
    fn default() -> Self {
        Self::with_space(1, ID_SPACE_END)
    }
}

impl PickingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator over `[start, end)`; `start` is clamped past the reserved id 0.
    pub fn with_space(start: u32, end: u32) -> Self {
        let start = start.max(1);
        let free = if start < end { vec![PickingRange { start, end }] } else { Vec::new() };
        Self { free }
    }

    pub fn available(&self) -> u32 {
        self.free.iter().map(|r| r.len()).sum()
    }

    pub fn free_ranges(&self) -> &[PickingRange] {
        &self.free
    }

    /// Greedily consumes free ranges from the front, splitting the last one.
    pub fn allocate(&mut self, n: u32) -> Result<PickingAllocation> {
        let available = self.available();
        if n > available {
            return Err(GraphError::PickingExhausted { requested: n, available });
        }

        let mut ranges = Vec::new();
        let mut remaining = n;
        while remaining > 0 {
            let Some(head) = self.free.first_mut() else {
                break;
            };
            if head.len() <= remaining {
                remaining -= head.len();
                ranges.push(self.free.remove(0));
            } else {
                let taken = PickingRange { start: head.start, end: head.start + remaining };
                head.start = taken.end;
                ranges.push(taken);
                remaining = 0;
            }
        }
        Ok(PickingAllocation { ranges, count: n })
    }

    /// Returns an allocation's ranges, merging with contiguous free neighbours.
    pub fn deallocate(&mut self, allocation: &PickingAllocation) {
        for &range in &allocation.ranges {
            if range.is_empty() {
                continue;
            }
            let at = self.free.partition_point(|r| r.start < range.start);
            self.free.insert(at, range);

            if at + 1 < self.free.len() && self.free[at].end == self.free[at + 1].start {
                self.free[at].end = self.free[at + 1].end;
                self.free.remove(at + 1);
            }
            if at > 0 && self.free[at - 1].end == self.free[at].start {
                self.free[at - 1].end = self.free[at].end;
                self.free.remove(at);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_skip_reserved_zero() {
        let mut a = PickingAllocator::new();
        let alloc = a.allocate(3).unwrap();
        assert_eq!(alloc.ranges(), &[PickingRange { start: 1, end: 4 }]);
        assert_eq!(alloc.id(0), Some(1));
        assert_eq!(alloc.slot_of(3), Some(2));
        assert_eq!(alloc.slot_of(4), None);
    }

    #[test]
    fn colors_are_little_endian_with_low_bit_set() {
        assert_eq!(encode_color(1), [3, 0, 0, 0]);
        assert_eq!(encode_color(0x80), [1, 1, 0, 0]);
        let alloc = PickingAllocator::new().allocate(2).unwrap();
        assert_eq!(alloc.color_buffer(), vec![3, 0, 0, 0, 5, 0, 0, 0]);
    }

    #[test]
    fn pixel_decoding_reverses_channel_order() {
        // Shader output for id 0x80: value 0x101 with the low byte in alpha.
        assert_eq!(decode_pixel([0, 0, 1, 1]), Some(0x80));
        assert_eq!(decode_pixel([0, 0, 0, 0]), None);
        assert_eq!(decode_pixel([0, 0, 0, 1]), None);
        assert_eq!(decode_pixel([0, 0, 0, 2]), None);
        assert_eq!(decode_pixel(encode_color(0x80)), None);
        assert_eq!(rendered_pixel(0x80), [0, 0, 1, 1]);
        assert_eq!(decode_pixel(rendered_pixel(12_345)), Some(12_345));
    }

    #[test]
    fn lifo_release_restores_the_free_list() {
        let mut a = PickingAllocator::new();
        let before = a.free_ranges().to_vec();
        let first = a.allocate(10).unwrap();
        let second = a.allocate(5).unwrap();
        a.deallocate(&second);
        a.deallocate(&first);
        assert_eq!(a.free_ranges(), &before[..]);
        assert_eq!(a.allocate(10).unwrap(), first);
    }

    #[test]
    fn out_of_order_release_merges_neighbours() {
        let mut a = PickingAllocator::with_space(1, 31);
        let x = a.allocate(10).unwrap();
        let y = a.allocate(10).unwrap();
        let z = a.allocate(10).unwrap();
        a.deallocate(&x);
        a.deallocate(&z);
        assert_eq!(a.free_ranges().len(), 2);
        a.deallocate(&y);
        assert_eq!(a.free_ranges(), &[PickingRange { start: 1, end: 31 }]);
    }

    #[test]
    fn fragmented_allocation_spans_ranges() {
        let mut a = PickingAllocator::with_space(1, 21);
        let x = a.allocate(5).unwrap();
        let _y = a.allocate(5).unwrap();
        a.deallocate(&x);
        let z = a.allocate(8).unwrap();
        assert_eq!(
            z.ranges(),
            &[PickingRange { start: 1, end: 6 }, PickingRange { start: 11, end: 14 }]
        );
        assert_eq!(z.id(6), Some(12));
        assert_eq!(z.slot_of(12), Some(6));
    }

    #[test]
    fn exhaustion_is_a_hard_error() {
        let mut a = PickingAllocator::with_space(1, 5);
        let err = a.allocate(5).unwrap_err();
        assert!(matches!(err, GraphError::PickingExhausted { requested: 5, available: 4 }));
        assert_eq!(a.available(), 4);
        assert!(a.allocate(4).is_ok());
    }

    #[test]
    fn empty_allocation_is_free() {
        let mut a = PickingAllocator::new();
        let alloc = a.allocate(0).unwrap();
        assert!(alloc.is_empty() && alloc.color_buffer().is_empty());
        a.deallocate(&alloc);
        assert_eq!(a.available(), ID_SPACE_END - 1);
    }
}
