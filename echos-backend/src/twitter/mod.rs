//! Twitter/X ingestion and reply pipeline.
//!
//! Mentions and followed-account timelines are fetched incrementally behind
//! per-agent checkpoints, threads are reconstructed from the store (falling
//! back to the platform), and the response generator's evaluation is turned
//! into a meme reply, a text reply, a quote tweet, or nothing.

pub mod agent;
pub mod api;
pub mod client;
pub mod helpers;
pub mod oauth;
pub mod pipeline;
pub mod poster;
pub mod reply_filter;
pub mod thread;
pub mod types;
pub mod workflows;

#[cfg(test)]
pub mod mock;

pub use agent::ReplyGuyAgent;
pub use client::XApiClient;
pub use workflows::{reply_to_tweet, run_followers_cycle, run_mentions_cycle};
