//! Onboarding flow — registration state machine and localized templates.

pub mod engine;
pub mod templates;

pub use engine::{Advance, StepOutcome, advance, repair_step};
pub use templates::{PromptKind, prompt};
