//! Infrastructure concerns shared by every binary in the workspace:
//! command line / environment configuration and console logging.

pub mod config;
pub mod logging;
