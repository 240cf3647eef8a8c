#![recursion_limit = "256"]

//! A small decoder-only transformer, trained either as a
//! character-level language model or as an intent classifier.
//!
//! Layers, outermost first:
//!
//! * `cli`         argument parsing and printing
//! * `application` one use case per command
//! * `domain`      vocabulary, corpus types, errors, traits
//! * `data`        corpus loading, encoding, splitting, batch sampling
//! * `ml`          the model, training loop, generator and classifier
//! * `infra`       checkpoints, cancellation, metrics

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
