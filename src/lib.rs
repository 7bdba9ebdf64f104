#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod log;
pub mod common;
pub mod error;
pub mod arch;
pub mod arch_loader;
pub mod formula;
pub mod channel;
pub mod matcher;
pub mod switchblock;
pub mod stamper;
pub mod exporter;

#[cfg(test)]
mod testutil;
