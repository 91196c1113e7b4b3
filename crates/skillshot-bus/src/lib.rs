//! Event dispatch, delay scheduling, and switch monitoring.
//!
//! The plumbing underneath the coordination core, kept free of domain
//! knowledge: every component here is generic over the hook payload it
//! stores, so handlers are plain data dispatched by the machine rather
//! than closures borrowing into it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod delay;
pub mod dispatch;
pub mod switches;

pub use delay::DelayManager;
pub use dispatch::{Delivery, Dispatcher, EventQueue, Pending};
pub use switches::SwitchMonitor;
