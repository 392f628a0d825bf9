//! Channel permission bitsets and overwrite merging.
//!
//! Permissions are plain u64 bitsets mirroring the chat platform's wire
//! format. The merge algorithm in [`merge_overwrites`] is the single place
//! that reconciles two overwrite sets, both when building the overwrites for
//! a fresh ticket channel and when folding a category's parent overwrites
//! into a channel's own.

mod merge;
mod types;

pub use merge::merge_overwrites;
pub use types::*;
