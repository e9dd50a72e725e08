//! Common types for chart testing: errors, configuration, and the chart model

#![deny(missing_docs)]

pub mod chart;
pub mod config;
pub mod error;
pub mod version;

pub use chart::{ChartYaml, InstallIdentity, Maintainer, ValuesOverride};
pub use config::{ChartRepo, Configuration};
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Width of report delimiter lines
pub const DELIMITER_WIDTH: usize = 78;

/// A report delimiter line made of `c`.
pub fn delimiter_line(c: char) -> String {
    c.to_string().repeat(DELIMITER_WIDTH)
}
