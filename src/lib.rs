#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

// Must go first, so the logging macros are visible in all other modules
mod fmt;

pub mod client;
pub mod commands;
pub mod config;
pub mod http;
pub mod responses;
pub mod stack;
pub mod transport;
pub mod wifi;

#[cfg(feature = "examples")]
pub mod example;

#[cfg(test)]
extern crate alloc;

#[cfg(test)]
mod tests;
