//! Git collaborator and the local mirror store built on top of it.

pub mod commands;
pub mod mirror;

pub use commands::{GitCli, GitOps};
pub use mirror::{MirrorKey, MirrorStore, DATA_DIR, REPOSITORY_MARKER};
