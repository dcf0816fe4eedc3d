//! Adaptive listing copy
//!
//! - `rng`: deterministic xorshift32 generator and injectable clock
//! - `profile`: persisted learning profile and its storage
//! - `phrases`: tone-specific phrase pools
//! - `engine`: copy assembly and feedback handling

pub mod engine;
pub mod phrases;
pub mod profile;
pub mod rng;

pub use engine::{CopyContext, CopyEngine, CopyMode, GeneratedCopy, Tone};
pub use profile::{
    FileProfileStore, LearningProfile, MemoryProfileStore, ProfileService, ProfileStore,
    PROFILE_KEY,
};
pub use rng::{Clock, FixedClock, SystemClock, XorShift32};
