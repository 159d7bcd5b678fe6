// FILE: src/core/mod.rs
pub mod bouncer;
pub mod hasher;

pub use bouncer::Bouncer;
pub use hasher::{content_hash, detect_change, Change};
