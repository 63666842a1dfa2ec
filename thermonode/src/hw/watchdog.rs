// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Watchdog seam. On the board this is the independent watchdog (IWDG).

pub trait Watchdog {
    /// Reload the counter.
    fn feed(&mut self);
}

impl<W: Watchdog + ?Sized> Watchdog for &mut W {
    fn feed(&mut self) {
        (**self).feed()
    }
}
