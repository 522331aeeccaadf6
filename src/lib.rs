//! # Skillsync Library
//!
//! This library provides the core functionality for distributing versioned
//! skill definitions from remote Git sources into a local project tree. It
//! backs the `skillsync` command-line tool but can be embedded by any
//! application that wants to consume skill sources programmatically.
//!
//! ## Core Concepts
//!
//! - **Registry (`registry`)**: The user's declared sources, each with a
//!   Git URL, branch, optional subdirectory, and a priority rank.
//! - **Cache (`cache`, `git`)**: An on-disk mirror of every source, updated
//!   by conditional fetches and swapped atomically so readers never see a
//!   half-synced source.
//! - **Discovery (`discovery`)**: A recursive scan of each cached source
//!   that turns nested definition directories into flat, deterministic
//!   deployment names.
//! - **Resolution (`resolver`)**: Picks one winner per deployment name when
//!   several sources offer it, by priority, then version, then source id.
//! - **Deployment (`deploy`, `manifest`)**: Materializes the winning set
//!   into the target directory, writing only what changed and never
//!   clobbering a user's hand edits without being told to.
//!
//! ## Execution Flow
//!
//! A full run is sync → discover → resolve → deploy:
//!
//! 1. **Sync**: Fetch every enabled source in parallel, skipping sources
//!    whose remote head matches the stored token.
//! 2. **Discover**: Scan each cached source for definitions and flatten
//!    their paths into deployment names, dropping same-source collisions.
//! 3. **Resolve**: Merge the per-source candidate sets into one winner per
//!    name across all sources.
//! 4. **Deploy**: Compare winners against the target's manifest and stage,
//!    write, and prune as needed.
//!
//! Each step is a plain function over explicit inputs, so the pipeline can
//! be driven end to end or one stage at a time.

pub mod cache;
pub mod defaults;
pub mod deploy;
pub mod discovery;
pub mod error;
pub mod git;
pub mod hash;
pub mod manifest;
pub mod output;
pub mod registry;
pub mod resolver;
pub mod sync;
