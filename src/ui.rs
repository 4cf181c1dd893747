// SPDX-License-Identifier: MPL-2.0

//! Progress reporting and debug tracing hooks.

use std::time::Duration;

/// Conduit through which [resolve](crate::resolve) reports progress.
///
/// Every method has a default, so an embedding application only implements
/// the hooks it cares about. [DefaultUi] keeps all of them.
pub trait Ui {
    /// Called once, before the first resolution step.
    fn before_resolution(&self) {}

    /// Called once, after resolution ends. Fires on every exit path,
    /// including errors.
    fn after_resolution(&self) {}

    /// Called while the search is running, at most once per latched
    /// iteration interval (see [progress_rate](Self::progress_rate)).
    fn indicate_progress(&self) {}

    /// How long resolution may run before progress reporting kicks in. Once
    /// this much wall time has elapsed, the resolver latches the number of
    /// iterations performed so far and calls
    /// [indicate_progress](Self::indicate_progress) every that-many
    /// iterations from then on.
    fn progress_rate(&self) -> Duration {
        Duration::from_millis(330)
    }

    /// Receives a lazy debug message at the given search depth.
    ///
    /// The default builds the message only when the `log` facade has debug
    /// logging enabled, so tracing costs nothing when nobody listens.
    fn debug(&self, depth: usize, message: &dyn Fn() -> String) {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("{:indent$}{}", "", message(), indent = depth * 2);
        }
    }
}

/// A [Ui] that keeps every trait default: silent apart from the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUi;

impl Ui for DefaultUi {}
