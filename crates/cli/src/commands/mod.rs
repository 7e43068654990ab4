//! CLI subcommands

pub mod beat;
pub mod status;
