//! Client input management with spectator cycling

use log::debug;
use shared::input::{InputSource, InputView, Intent};

/// Wraps an input source and keeps track of who we watch once dead
pub struct InputManager {
    source: Box<dyn InputSource>,
    watching: Option<usize>,

    // Previous cycle state for edge detection
    prev_cycle: bool,
}

impl InputManager {
    pub fn new(source: Box<dyn InputSource>) -> Self {
        Self {
            source,
            watching: None,
            prev_cycle: false,
        }
    }

    /// Combatant currently being watched while spectating
    pub fn watching(&self) -> Option<usize> {
        self.watching
    }

    /// Polls the source and returns the intent to act on
    ///
    /// While dead no movement or shooting is passed through; a cycle press
    /// moves the view to the next combatant in `roster` instead.
    pub fn update(&mut self, view: &InputView, roster: &[usize]) -> Intent {
        let intent = self.source.poll(view);

        // Detect press events (current && !previous)
        let pressed = intent.cycle_spectate && !self.prev_cycle;
        self.prev_cycle = intent.cycle_spectate;

        if view.alive {
            self.watching = None;
            return intent;
        }

        let lost = self.watching.map_or(true, |index| !roster.contains(&index));
        if pressed || lost {
            self.watching = next_after(self.watching, roster);
            debug!("Spectating {:?}", self.watching);
        }

        Intent::default()
    }
}

/// Next index after `current` in the roster, wrapping around
fn next_after(current: Option<usize>, roster: &[usize]) -> Option<usize> {
    let first = roster.iter().copied().min();
    match current {
        Some(current) => roster
            .iter()
            .copied()
            .filter(|index| *index > current)
            .min()
            .or(first),
        None => first,
    }
}
