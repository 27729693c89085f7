pub mod config;
pub mod pipeline;
pub mod registry;
pub mod synthesizer;
