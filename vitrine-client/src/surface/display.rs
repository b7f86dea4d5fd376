//! TV surface: drives the display machine from sync traffic and timers

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::display::{DisplayMachine, DisplayMode, SUPER_OFFER_INTERVAL, Screen, ScrollAnimator};
use crate::sync::{SyncEvent, SyncHandle};

/// Presentation settings for the price-list scroll
#[derive(Debug, Clone)]
pub struct DisplayOptions {
    /// Animation frame period
    pub frame_interval: Duration,
    /// Row height of the price list, px
    pub row_height: u32,
    /// Visible height of the price list, px
    pub viewport: u32,
    pub scroll_speed: u32,
    pub pause_frames: u32,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            row_height: 72,
            viewport: 720,
            scroll_speed: crate::display::scroll::DEFAULT_SPEED,
            pause_frames: crate::display::scroll::DEFAULT_PAUSE_FRAMES,
        }
    }
}

/// Running display surface
pub struct DisplaySurface {
    screen: watch::Receiver<Screen>,
    scroll: watch::Receiver<u32>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DisplaySurface {
    pub fn spawn(sync: &SyncHandle, options: DisplayOptions) -> Self {
        let machine = DisplayMachine::new(sync.state());
        let (screen_tx, screen) = watch::channel(machine.screen());
        let (scroll_tx, scroll) = watch::channel(0);
        let shutdown = CancellationToken::new();

        let driver = Driver {
            machine,
            states: sync.subscribe_state(),
            events: sync.events(),
            screen_tx,
            scroll_tx,
            animator: ScrollAnimator::new(options.scroll_speed, options.pause_frames),
            options,
        };
        let task = tokio::spawn(driver.run(shutdown.clone()));

        Self {
            screen,
            scroll,
            shutdown,
            task: Some(task),
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Screen> {
        self.screen.clone()
    }

    /// Current price-list scroll offset, px
    pub fn scroll_offset(&self) -> u32 {
        *self.scroll.borrow()
    }

    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for DisplaySurface {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Driver {
    machine: DisplayMachine,
    states: watch::Receiver<shared::AppState>,
    events: broadcast::Receiver<SyncEvent>,
    screen_tx: watch::Sender<Screen>,
    scroll_tx: watch::Sender<u32>,
    animator: ScrollAnimator,
    options: DisplayOptions,
}

impl Driver {
    async fn run(mut self, shutdown: CancellationToken) {
        let mut mode = self.machine.mode();
        let mut rotation_at = Instant::now() + self.machine.rotation_interval();
        let mut super_at = Instant::now() + SUPER_OFFER_INTERVAL;
        let mut frames = tokio::time::interval(self.options.frame_interval);
        frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        self.update_extent();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                changed = self.states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = self.states.borrow_and_update().clone();
                    self.machine.apply_state(state);
                    self.update_extent();
                }

                event = self.events.recv() => match event {
                    Ok(SyncEvent::Highlight { promotion_id }) => {
                        tracing::info!(?promotion_id, "Highlight requested");
                        self.machine.highlight(promotion_id);
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Display lagged {n} sync events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                _ = tokio::time::sleep_until(rotation_at), if mode == DisplayMode::NormalRotation => {
                    self.machine.advance_rotation();
                    rotation_at = Instant::now() + self.machine.rotation_interval();
                }

                _ = tokio::time::sleep_until(super_at), if mode == DisplayMode::SuperOfferTakeover => {
                    self.machine.advance_super_offer();
                    super_at = Instant::now() + SUPER_OFFER_INTERVAL;
                }

                _ = frames.tick() => {
                    let offset = self.animator.tick();
                    self.scroll_tx.send_if_modified(|current| {
                        let changed = *current != offset;
                        *current = offset;
                        changed
                    });
                    continue;
                }
            }

            // Timers restart from zero whenever the mode changes
            let next = self.machine.mode();
            if next != mode {
                tracing::debug!(from = ?mode, to = ?next, "Display mode changed");
                let now = Instant::now();
                rotation_at = now + self.machine.rotation_interval();
                super_at = now + SUPER_OFFER_INTERVAL;
                mode = next;
            }
            self.publish();
        }
    }

    fn publish(&self) {
        let screen = self.machine.screen();
        self.screen_tx.send_if_modified(|current| {
            if *current == screen {
                return false;
            }
            *current = screen;
            true
        });
    }

    fn update_extent(&mut self) {
        let rows = self.machine.state().products.len() as u32;
        self.animator
            .set_extent(rows * self.options.row_height, self.options.viewport);
    }
}
