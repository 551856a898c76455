// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! The lazy-dicing state machine of §4.5:
//!
//! ```text
//! NotDiced --first-ray-touches--> Dicing --success--> Diced
//!                                    |
//!                                    +--error/abort--> NotDiced (retry)
//! ```
//!
//! Only one thread may perform the `NotDiced -> Dicing` transition; others
//! wait on a condition variable rather than spin-sleeping, per the §9
//! redesign note and grounded on the `parking_lot` `Mutex`/`Condvar` pair
//! the sibling pack crate `panxinmiao-myth` uses for its own asset-loading
//! state.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DicingStatus {
    NotDiced,
    Dicing,
    Diced,
}

pub struct DicingGate {
    status: Mutex<DicingStatus>,
    changed: Condvar,
}

impl Default for DicingGate {
    fn default() -> Self {
        Self {
            status: Mutex::new(DicingStatus::NotDiced),
            changed: Condvar::new(),
        }
    }
}

/// What the caller of `enter` must do next.
pub enum DicingEntry {
    /// The calling thread won the race and must perform the dicing work,
    /// then call `finish(true)` on success or `finish(false)` to roll
    /// back to `NotDiced` (error/abort, §4.5 and §5 cancellation).
    YouDice,
    /// The object is already diced; proceed directly.
    AlreadyDiced,
}

impl DicingGate {
    pub fn status(&self) -> DicingStatus {
        *self.status.lock()
    }

    /// Blocks until the object is `Diced`, or returns `DicingEntry::YouDice`
    /// if this thread is the one responsible for dicing it.
    pub fn enter(&self) -> DicingEntry {
        let mut status = self.status.lock();
        loop {
            match *status {
                DicingStatus::Diced => return DicingEntry::AlreadyDiced,
                DicingStatus::NotDiced => {
                    *status = DicingStatus::Dicing;
                    return DicingEntry::YouDice;
                }
                DicingStatus::Dicing => {
                    self.changed.wait(&mut status);
                }
            }
        }
    }

    pub fn finish(&self, success: bool) {
        let mut status = self.status.lock();
        *status = if success {
            DicingStatus::Diced
        } else {
            DicingStatus::NotDiced
        };
        drop(status);
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // S4: lazy dicing under races. Exactly one thread observes
    // NotDiced -> Dicing; all threads eventually see Diced.
    #[test]
    fn s4_exactly_one_thread_dices() {
        let gate = Arc::new(DicingGate::default());
        let dicers = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let dicers = dicers.clone();
                std::thread::spawn(move || match gate.enter() {
                    DicingEntry::YouDice => {
                        dicers.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(5));
                        gate.finish(true);
                    }
                    DicingEntry::AlreadyDiced => {}
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(dicers.load(Ordering::SeqCst), 1);
        assert_eq!(gate.status(), DicingStatus::Diced);
    }

    #[test]
    fn failed_dice_rolls_back_to_not_diced() {
        let gate = DicingGate::default();
        match gate.enter() {
            DicingEntry::YouDice => gate.finish(false),
            DicingEntry::AlreadyDiced => unreachable!(),
        }
        assert_eq!(gate.status(), DicingStatus::NotDiced);
    }
}
