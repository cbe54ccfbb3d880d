//! Newsletter link auditing: locate category sections in a letter, classify
//! every outbound link, and score each link's text against the facts on the
//! page it points to.

pub mod analysis;
pub mod cache;
pub mod category;
pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod parser;
pub mod report;
