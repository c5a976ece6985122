//! Library components of the `data-monitor` command line.

pub mod logging;
pub mod pipeline;
