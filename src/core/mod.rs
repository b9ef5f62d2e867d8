//! Import and matching operations, independent of how they are triggered.

pub mod batch;
pub mod catalog;
pub mod counters;
pub mod feed;
pub mod import;
pub mod incremental;
pub mod items;
pub mod lifecycle;
pub mod matcher;
pub mod search;
pub mod source;
pub mod text;
