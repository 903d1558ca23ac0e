//! Single-learner adaptive assessment: the mastery tracker and the session
//! controller that drives it.

pub mod controller;
pub mod mastery;

pub use controller::{AdaptiveController, AnswerOutcome};
