// src/types/mod.rs
pub mod job;
pub mod profile;

pub use job::{ApplicationStatus, ExperienceLevel, Job};
pub use profile::Profile;
