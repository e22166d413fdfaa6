//! Configuration management
//!
//! File locations for the chain store and the wallet snapshot.

pub mod settings;

pub use settings::Config;
