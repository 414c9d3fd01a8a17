#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod api;
pub mod controllers;
pub mod git;
pub mod util;
