//! # Architecture Ports
//!
//! Hardware collaborators that implement [`crate::kernel::Port`]. Only
//! compiled for bare-metal ARM; the kernel core builds and tests on any
//! host without them.

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m4;
