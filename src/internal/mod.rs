// SPDX-License-Identifier: MPL-2.0

//! Non-public modules of the resolution state machine.

mod resolution;
mod state;

pub(crate) use resolution::Resolution;
pub(crate) use state::{ResolutionState, State};
