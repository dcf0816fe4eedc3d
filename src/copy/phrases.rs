//! Phrase pools for listing copy
//!
//! `{adj}` in a pacing line is replaced by a pacing adjective. Speed and
//! elegance keyword families are what sold-feedback looks for in the text.

pub const ATTACK_HOOKS: &[&str] = &[
    "Ready to ship today",
    "Don't miss this one",
    "Priced to move fast",
    "Grab it now while it lasts",
    "Instant standout for your collection",
];

pub const ELEGANT_HOOKS: &[&str] = &[
    "A quiet piece with timeless character",
    "Refined details, gently kept",
    "Graceful lines that speak softly",
    "Calm, elegant and ready for its next home",
];

pub const ATTACK_PACING: &[&str] = &[
    "{adj} shipping, packed the same day",
    "Order now for {adj} dispatch",
    "Checkout today and it leaves with {adj} handling",
];

pub const ELEGANT_PACING: &[&str] = &[
    "Wrapped with care for a {adj} arrival",
    "Prepared by hand for a {adj} unboxing",
    "Sent in protective packaging for a {adj} handover",
];

/// Adjectives used when the pacing threshold favours speed
pub const BRISK_ADJECTIVES: &[&str] = &["fast", "quick", "prompt"];

/// Adjectives used when the pacing threshold favours calm
pub const CALM_ADJECTIVES: &[&str] = &["calm", "unhurried", "careful"];

pub const ATTACK_CLOSINGS: &[&str] = &[
    "First come, first served",
    "Questions answered fast",
];

pub const ELEGANT_CLOSINGS: &[&str] = &[
    "Thank you for taking a quiet look",
    "Feel free to ask about any detail",
];

pub const ATTACK_SHORT_TAILS: &[&str] = &["ships today", "buy now", "fast deal"];

pub const ELEGANT_SHORT_TAILS: &[&str] = &["timeless", "quietly refined", "graceful"];

/// Keywords counted as speed-oriented copy
pub const SPEED_KEYWORDS: &[&str] = &["fast", "quick", "now", "today", "instant"];

/// Keywords counted as elegance-oriented copy
pub const ELEGANCE_KEYWORDS: &[&str] = &["quiet", "graceful", "timeless", "calm", "refined", "elegant"];
