//! Application services layer.

pub mod chrome;
pub mod error;
pub mod feed;
pub mod pagination;
pub mod render;
pub mod repos;
pub mod site;
pub mod stream;
