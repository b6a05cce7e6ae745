//! # Utilities Module
//!
//! Logging setup and unit conversions shared by the orchestrator and the
//! wallet binaries.

pub mod logger;
pub mod units;

pub use logger::{setup_logger, setup_logger_with_file};
pub use units::{parse_chain_id, parse_eth, parse_wei, to_hex_chain_id, WEI_PER_ETHER};
