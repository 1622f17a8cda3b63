//! Library crate for netmap-rs exposing the scan engine and its collaborators.
pub mod probe;
pub mod render;
pub mod resolve;
pub mod scanner;
pub mod subnet;
pub mod types;
