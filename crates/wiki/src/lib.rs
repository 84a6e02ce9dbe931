pub mod anonymize;
pub mod client;

pub use client::{parse_wikipedia_url, WikiSource};
