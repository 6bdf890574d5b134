use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_warn};
use readsync_core::{update, Banner, Msg, ScreenState};

use super::effects::EffectRunner;
use super::render;

/// How often the loop ticks while waiting on the backend.
const TICK_INTERVAL: Duration = Duration::from_millis(75);

/// One screen driven from the command line.
pub struct Session {
    state: ScreenState,
    runner: EffectRunner,
    last_banner: Option<Banner>,
}

impl Session {
    pub fn new(state: ScreenState, runner: EffectRunner) -> Self {
        let mut session = Self {
            state,
            runner,
            last_banner: None,
        };
        let ledger = session.runner.ledger().load();
        session.dispatch(Msg::LedgerRestored(ledger));
        session
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let was_dirty = state.consume_dirty();
        self.state = state;
        self.runner.run(effects);
        if was_dirty {
            self.announce_banner();
        }
    }

    /// Pump completions until nothing is outstanding or `timeout` passes.
    /// Returns `false` on timeout.
    pub fn run_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.runner.is_idle() {
            if Instant::now() >= deadline {
                engine_warn!("Gave up waiting for the backend after {:?}", timeout);
                return false;
            }
            if let Some(msg) = self.runner.poll(TICK_INTERVAL) {
                self.dispatch(msg);
            }
            self.dispatch(Msg::Tick {
                now: Instant::now(),
            });
        }
        true
    }

    /// Show every queued banner now instead of waiting out each interval.
    pub fn flush_banners(&mut self) {
        self.dispatch(Msg::Tick {
            now: Instant::now(),
        });
        while self.state.view().banner.is_some() {
            self.dispatch(Msg::BannerDismissed {
                now: Instant::now(),
            });
        }
    }

    pub fn print(&self) {
        for line in render::render(&self.state.view()) {
            println!("{line}");
        }
    }

    fn announce_banner(&mut self) {
        let banner = self.state.view().banner;
        if banner != self.last_banner {
            if let Some(banner) = &banner {
                engine_debug!("Showing banner {:?}", banner);
                println!("{}", render::render_banner(banner));
            }
            self.last_banner = banner;
        }
    }
}
