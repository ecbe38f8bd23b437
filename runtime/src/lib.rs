// Copyright 2026 Pixmirror Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pixmirror library: discover the images a fixed set of rendered pages
//! reference, then mirror them to local storage.
//!
//! Phase 1 (`discovery`) renders each configured page, runs the image
//! extraction engine against it and writes a sorted URL list. Phase 2
//! (`download`) reads that list and mirrors every URL onto the filesystem.

pub mod acquisition;
pub mod classify;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod download;
pub mod error;
pub mod extraction;
pub mod pacing;
pub mod renderer;
pub mod retry;
