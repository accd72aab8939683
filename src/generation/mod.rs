//! # Generation
//!
//! The boundary with the generative model: the adapter contract, typed
//! failures, and prompt assembly.

pub mod adapter;
pub mod prompts;

pub use adapter::{FailureKind, GenerationAdapter, GenerationFailure, GenerationRequest};
pub use prompts::{build_edit_prompt, build_prompt};
