//! Sender records and their lifecycle types.

pub mod model;

pub use model::{Language, OnboardingStep, Profile, SenderRecord, SenderStatus};
