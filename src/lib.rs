// Library surface for the binary and the integration tests.
// Terminal rendering stays in the bin crate.
pub mod app_dirs;
pub mod config;
pub mod cues;
pub mod error;
pub mod runtime;
pub mod scheduler;
pub mod sequencer;
pub mod settings;
pub mod timer;
pub mod zone;
