//! Machine orchestration for Skillshot ball devices.
//!
//! Provides [`Machine`] as the primary user-facing API: a single-threaded
//! cooperative coordinator that owns the device registry, event plumbing,
//! delay scheduler, and switch monitor, and settles every external
//! stimulus to quiescence before returning. [`RealtimeRunner`] maps a
//! wall clock and a hardware input channel onto the lockstep machine.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod machine;
pub mod realtime;

pub use machine::{EjectArgs, Machine};
pub use realtime::{InputEvent, RealtimeRunner};
