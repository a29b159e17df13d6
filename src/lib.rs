pub mod analyzer;
pub mod catalog_export;
pub mod config;
pub mod model;
pub mod normalizer;
pub mod options;
pub mod parser;
pub mod pipeline;
pub mod source;
pub mod storage;
pub mod utils;
pub mod vehicles;
