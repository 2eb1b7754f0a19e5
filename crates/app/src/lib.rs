#![deny(unsafe_code)]

//! Terminal front end for the anonymous chat room.

pub mod app;
pub mod error;
pub mod logging;
pub mod settings;
pub mod terminal;
