//! Top-level facade crate for calltally.
//!
//! Re-exports the core primitives and the instrumentation runtime so users can
//! depend on a single crate.

pub mod core {
    pub use calltally_core::*;
}

pub mod instrument {
    pub use calltally_instrument::*;
}
