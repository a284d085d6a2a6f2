// src/services/mod.rs

//! Exam-attempt and scoring workflow.
//!
//! Handlers stay thin: they decode the request, resolve the caller and call
//! into these modules, which hold every permission check and state rule.

pub mod access;
pub mod attempts;
pub mod results;
pub mod scoring;
pub mod submission;

#[cfg(test)]
pub(crate) mod fixtures;
