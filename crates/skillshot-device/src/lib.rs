//! Ball devices, the eject engine, and the ball save.
//!
//! The domain layer of the coordination core: [`BallDevice`] owns the
//! per-device counting and eject state machines, [`DeviceRegistry`] owns
//! the devices, [`BallSave`] is the drain-swallowing adjunct, and the
//! hook enums in [`hooks`] are the data-not-closures handler layer the
//! machine dispatches on.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod confirm;
pub mod device;
pub mod eject;
pub mod hooks;
pub mod registry;
pub mod save;

pub use device::{BallDevice, DEFAULT_EJECT_TIMEOUT_MS};
pub use hooks::{AfterHook, Cx, DelayHook, DelayKey, EventHook, SwitchHook};
pub use registry::{BuiltRegistry, DeviceRegistry, PeerDevices};
pub use save::BallSave;
