//! Blog front-end over a headless CMS: paginated listing, post pages with
//! on-demand fallback rendering, and a static site export.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
