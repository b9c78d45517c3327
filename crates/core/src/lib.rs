pub mod config;
pub mod gateway;
pub mod grouping;
pub mod merging;
pub mod pipeline;
pub mod shared;
