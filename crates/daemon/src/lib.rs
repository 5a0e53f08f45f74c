#![forbid(unsafe_code)]

//! Draw keeper daemon: triggers due lottery draws and serves the countdown.

pub mod chain;
pub mod config;
pub mod http;
pub mod keeper;
pub mod status;
