//! Multitap cycle keys.
//!
//! A cycle key carries an ordered set of characters. Clicking it again
//! within the multitap timeout replaces the character it inserted with the
//! next one in the set; a click on another key, or the timeout, commits the
//! preedit.

use crate::composer::PreeditComposer;
use crate::host::InputHost;
use crate::key::{KeyEvent, SpecialKey};
use crate::timer::Timer;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CycleKeyHandler {
    cycle_text: Vec<char>,
    cycle_index: usize,
    prev_event: Option<KeyEvent>,
    /// Character this handler last put at the end of the preedit
    inserted: Option<char>,
    timer: Timer,
}

impl CycleKeyHandler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            cycle_text: Vec::new(),
            cycle_index: 0,
            prev_event: None,
            inserted: None,
            timer: Timer::new(timeout),
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timer.set_interval(timeout);
    }

    pub fn is_cycling(&self) -> bool {
        self.timer.is_active()
    }

    pub fn cycle_index(&self) -> usize {
        self.cycle_index
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Handle a text click. Returns true if the click was consumed.
    ///
    /// A click other than the pending cycle key first commits the preedit.
    pub fn handle_click<H: InputHost + ?Sized>(
        &mut self,
        event: &KeyEvent,
        composer: &mut PreeditComposer,
        host: &mut H,
        now: Instant,
    ) -> bool {
        let same_key = self
            .prev_event
            .as_ref()
            .is_some_and(|prev| prev.same_key(event));

        if self.timer.is_active() && !same_key {
            self.commit(composer, host);
        }

        if event.special != SpecialKey::CycleSet {
            return false;
        }

        let cycle_text: Vec<char> = event.text.chars().collect();
        if cycle_text.is_empty() {
            warn!(key = ?event.key, "cycle key without characters");
            return true;
        }

        let mut preedit = composer.preedit().to_string();
        if self.timer.is_active() && same_key {
            if self.inserted.is_some() && preedit.ends_with(|c| Some(c) == self.inserted) {
                preedit.pop();
                self.cycle_index = (self.cycle_index + 1) % cycle_text.len();
            } else {
                warn!(preedit = %preedit, "preedit changed under cycle key, restarting cycle");
                self.cycle_index = 0;
            }
        } else {
            self.cycle_index = 0;
        }

        let ch = cycle_text[self.cycle_index];
        preedit.push(ch);
        debug!(index = self.cycle_index, %ch, "cycle key");

        self.cycle_text = cycle_text;
        self.inserted = Some(ch);
        self.prev_event = Some(event.clone());
        composer.set_raw_preedit(&preedit, host);
        self.timer.start(now);
        true
    }

    /// Commit the cycled character if the timeout has passed.
    pub fn tick<H: InputHost + ?Sized>(&mut self, now: Instant, composer: &mut PreeditComposer, host: &mut H) {
        if self.timer.poll(now) {
            self.commit(composer, host);
        }
    }

    /// Commit a character still cycling, as if its timeout had passed.
    pub fn commit_pending<H: InputHost + ?Sized>(&mut self, composer: &mut PreeditComposer, host: &mut H) {
        if self.timer.is_active() {
            self.commit(composer, host);
        }
    }

    fn commit<H: InputHost + ?Sized>(&mut self, composer: &mut PreeditComposer, host: &mut H) {
        self.timer.stop();
        composer.flush(host);
        self.clear();
    }

    /// Forget the pending cycle without committing.
    pub fn reset(&mut self) {
        self.timer.stop();
        self.clear();
    }

    fn clear(&mut self) {
        self.cycle_text.clear();
        self.cycle_index = 0;
        self.prev_event = None;
        self.inserted = None;
    }
}
