//! Static site builder for api-inliner.
//!
//! Renders markdown and template pages into an output directory and fires
//! [`BuildPlugin`](api_inliner_core::BuildPlugin) hooks around page
//! generation, so inlined API data lands in every emitted page.

pub mod builder;
pub mod templates;

pub use builder::{BuildError, BuildResult, SiteConfig, StaticBuilder};
