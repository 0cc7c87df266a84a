//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `geocatalog_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    // Tiny probe to validate core crate wiring independently from any
    // request-handling layer.
    println!("geocatalog_core ping={}", geocatalog_core::ping());
    println!("geocatalog_core version={}", geocatalog_core::core_version());
}
