//! Timer-driven rotation index

/// Rotation position over a list whose length may change between ticks.
///
/// The raw position only grows; lookups wrap it, so shrinking the list never
/// produces an out-of-range index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Carousel {
    position: usize,
}

impl Carousel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index into a list of `len` items, `None` when the list is empty
    pub fn current(&self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.position % len)
    }

    /// Step to the next item; returns the new index
    pub fn advance(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            self.position = 0;
            return None;
        }
        self.position = (self.position % len + 1) % len;
        Some(self.position)
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }
}

/// Number of pages needed for `items` at `per_page` each
pub fn page_count(items: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    items.div_ceil(per_page)
}
