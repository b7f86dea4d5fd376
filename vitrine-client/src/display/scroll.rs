//! Price-list scroll animation

/// Frames to hold at each end before reversing
pub const DEFAULT_PAUSE_FRAMES: u32 = 90;

/// Pixels moved per frame
pub const DEFAULT_SPEED: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}

/// Mutable state for the vertical scroll of the price list.
///
/// Moves `speed` pixels per frame between 0 and the overflow of the content,
/// holding `pause_frames` at each end before turning around.
#[derive(Debug, Clone)]
pub struct ScrollAnimator {
    offset: u32,
    max_offset: u32,
    speed: u32,
    pause_frames: u32,
    paused: u32,
    direction: Direction,
}

impl Default for ScrollAnimator {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED, DEFAULT_PAUSE_FRAMES)
    }
}

impl ScrollAnimator {
    pub fn new(speed: u32, pause_frames: u32) -> Self {
        Self {
            offset: 0,
            max_offset: 0,
            speed: speed.max(1),
            pause_frames,
            // Hold at the top before the first pass too
            paused: pause_frames,
            direction: Direction::Down,
        }
    }

    /// Set content and viewport heights; content that fits does not scroll
    pub fn set_extent(&mut self, content: u32, viewport: u32) {
        self.max_offset = content.saturating_sub(viewport);
        if self.offset > self.max_offset {
            self.offset = self.max_offset;
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_paused(&self) -> bool {
        self.paused > 0
    }

    /// Advance one animation frame; returns the new offset
    pub fn tick(&mut self) -> u32 {
        if self.max_offset == 0 {
            self.offset = 0;
            return 0;
        }
        if self.paused > 0 {
            self.paused -= 1;
            return self.offset;
        }

        match self.direction {
            Direction::Down => {
                self.offset = (self.offset + self.speed).min(self.max_offset);
                if self.offset == self.max_offset {
                    self.turn(Direction::Up);
                }
            }
            Direction::Up => {
                self.offset = self.offset.saturating_sub(self.speed);
                if self.offset == 0 {
                    self.turn(Direction::Down);
                }
            }
        }
        self.offset
    }

    fn turn(&mut self, direction: Direction) {
        self.direction = direction;
        self.paused = self.pause_frames;
    }
}
