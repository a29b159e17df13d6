// Options module: static catalog, text detector and dollar totals.

pub mod catalog;
pub mod detector;
pub mod pricing;

pub use catalog::{Catalog, OptionCategory, OptionDefinition};
pub use detector::OptionsDetector;
pub use pricing::{MsrpQuote, MsrpResolver, MsrpSource};
