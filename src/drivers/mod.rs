//! Capture driver backends
//!
//! - [`emulated::EmulatedDriver`] keeps everything in memory and runs anywhere
//! - [`native::NativeDriver`] binds libntapi (requires the `napatech` feature)

pub mod emulated;
pub mod native;

pub use emulated::{EmulatedDriver, EmulatedFrame, FailPoint};
pub use native::NativeDriver;
