/// Linear-index → 2-D texel addressing shared by every data texture.
///
/// The grid is the smallest power-of-two rectangle holding `count` texels:
/// `width = next_pow2(ceil(sqrt(count)))`, `height = next_pow2(ceil(count / width))`.
/// Index `i` lives at `(i mod width, i div width)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TexelGrid {
    pub width: u32,
    pub height: u32,
}

impl TexelGrid {
    /// Zero texels still yield a valid 1×1 grid.
    pub fn for_count(count: usize) -> Self {
        if count == 0 {
            return Self { width: 1, height: 1 };
        }
        let side = (count as f64).sqrt().ceil() as usize;
        let width = side.next_power_of_two();
        let height = count.div_ceil(width).next_power_of_two();
        Self { width: width as u32, height: height as u32 }
    }

    #[inline]
    pub fn capacity(self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    pub fn coord(self, index: usize) -> (u32, u32) {
        let w = self.width as usize;
        ((index % w) as u32, (index / w) as u32)
    }
}
