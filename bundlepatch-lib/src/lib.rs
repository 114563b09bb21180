pub mod backend;
pub mod catalog;
pub mod config;
pub mod confirmation;
pub mod download_runner;
pub mod error;
pub mod http_backend;
pub mod label;
pub mod logging;
pub mod manifest;
pub mod observer;
pub mod patch_system;
pub mod phase;
pub mod size_probe;

#[cfg(test)]
pub mod test_helpers;
