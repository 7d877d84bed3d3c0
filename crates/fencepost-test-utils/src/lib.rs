//! Mock GPU devices and test helpers for fencepost development.
//!
//! [`MockDevice`] completes work only when told to, which makes fence
//! timing fully deterministic. [`ThreadedDevice`] runs submissions on a
//! background queue thread for tests that exercise real blocking waits.
//! Both keep byte-accurate buffer contents in a [`BufferStore`] and record
//! every use of a released buffer as a violation.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod mock;
mod store;
mod threaded;
mod token;

pub use mock::MockDevice;
pub use store::BufferStore;
pub use threaded::ThreadedDevice;
pub use token::{Signal, SignalToken};

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
