//! Listing copy generation biased by the learning profile

use super::{
    phrases::{
        ATTACK_CLOSINGS, ATTACK_HOOKS, ATTACK_PACING, ATTACK_SHORT_TAILS, BRISK_ADJECTIVES,
        CALM_ADJECTIVES, ELEGANCE_KEYWORDS, ELEGANT_CLOSINGS, ELEGANT_HOOKS, ELEGANT_PACING,
        ELEGANT_SHORT_TAILS, SPEED_KEYWORDS,
    },
    profile::{LearningProfile, ProfileService},
    rng::{Clock, SystemClock, XorShift32},
};
use crate::{
    error::{Result, WhiteMuseError},
    types::{BrandCandidate, Item, SizeEstimate},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

/// Style scalar deviation from neutral is scaled by this before biasing a threshold
pub const STYLE_BIAS_SCALE: f32 = 0.4;

/// Nudge applied to the resolved tone's scalar on "used"
pub const USED_NUDGE: f32 = 0.03;

/// Nudge applied per matching keyword family on "sold"
pub const SOLD_NUDGE: f32 = 0.06;

/// Nudge applied to `short` when a sold listing's short copy was long enough
pub const SHORT_NUDGE: f32 = 0.03;

/// Short copy longer than this (in characters) counts toward the `short` scalar
pub const SHORT_COPY_THRESHOLD: usize = 20;

/// Maximum characters of recognized text quoted in the copy
pub const OCR_EXCERPT_CHARS: usize = 80;

/// Requested copy tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyMode {
    /// Let the generator pick a tone
    #[default]
    Auto,
    Attack,
    Elegant,
}

impl std::str::FromStr for CopyMode {
    type Err = WhiteMuseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "attack" => Ok(Self::Attack),
            "elegant" => Ok(Self::Elegant),
            other => Err(WhiteMuseError::invalid_config(format!(
                "Unknown copy mode '{}'. Use auto, attack or elegant",
                other
            ))),
        }
    }
}

impl std::fmt::Display for CopyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Attack => write!(f, "attack"),
            Self::Elegant => write!(f, "elegant"),
        }
    }
}

/// Tone actually used for a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Attack,
    Elegant,
}

impl From<Tone> for CopyMode {
    fn from(tone: Tone) -> Self {
        match tone {
            Tone::Attack => Self::Attack,
            Tone::Elegant => Self::Elegant,
        }
    }
}

/// Per-item facts the copy is built from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CopyContext {
    /// Per-item seed mixed into the generator
    pub seed: u32,
    pub category: String,
    pub condition: Option<String>,
    pub accessories: Option<String>,
    pub ocr_text: Option<String>,
    pub brands: Vec<BrandCandidate>,
    pub size: Option<SizeEstimate>,
}

impl CopyContext {
    #[must_use]
    pub fn new<S: Into<String>>(category: S) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    /// Context derived from a processed item
    #[must_use]
    pub fn from_item<S: Into<String>>(item: &Item, category: S) -> Self {
        Self {
            seed: Self::seed_from_name(&item.name),
            category: category.into(),
            ocr_text: item.ocr.as_ref().map(|o| o.text.clone()),
            brands: item
                .ocr
                .as_ref()
                .map(|o| o.candidates.clone())
                .unwrap_or_default(),
            size: item.size,
            ..Self::default()
        }
    }

    /// Stable seed from a name: first four bytes of its SHA-256 digest
    #[must_use]
    pub fn seed_from_name(name: &str) -> u32 {
        let digest = Sha256::digest(name.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        u32::from_be_bytes(bytes)
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_condition<S: Into<String>>(mut self, condition: S) -> Self {
        self.condition = Some(condition.into());
        self
    }

    #[must_use]
    pub fn with_accessories<S: Into<String>>(mut self, accessories: S) -> Self {
        self.accessories = Some(accessories.into());
        self
    }

    #[must_use]
    pub fn with_ocr_text<S: Into<String>>(mut self, text: S) -> Self {
        self.ocr_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_brands(mut self, brands: Vec<BrandCandidate>) -> Self {
        self.brands = brands;
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: SizeEstimate) -> Self {
        self.size = Some(size);
        self
    }
}

/// Long and short listing copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCopy {
    pub long: String,
    pub short: String,
    pub mode: CopyMode,
    pub tone: Tone,
}

/// Copy generator owning the learning profile
pub struct CopyEngine {
    profile: ProfileService,
    clock: Box<dyn Clock>,
}

impl CopyEngine {
    /// Engine seeded from the wall clock
    #[must_use]
    pub fn new(profile: ProfileService) -> Self {
        Self::with_clock(profile, Box::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(profile: ProfileService, clock: Box<dyn Clock>) -> Self {
        Self { profile, clock }
    }

    #[must_use]
    pub fn profile(&self) -> &LearningProfile {
        self.profile.profile()
    }

    /// Generate copy; the generator is seeded from time, salt and `context.seed`
    #[instrument(skip(self, context), fields(seed = context.seed))]
    pub fn generate(&self, mode: CopyMode, context: &CopyContext) -> GeneratedCopy {
        let mut rng = XorShift32::from_parts(
            self.clock.now_millis(),
            self.profile.profile().salt,
            context.seed,
        );
        let copy = compose(mode, context, self.profile.profile(), &mut rng);
        debug!(tone = ?copy.tone, "generated listing copy");
        copy
    }

    /// Record that the copy was used
    ///
    /// # Errors
    /// - Persisting the profile fails
    pub fn record_used(&mut self, copy: &GeneratedCopy) -> Result<()> {
        let tone = copy.tone;
        self.profile.update(|p| {
            match tone {
                Tone::Attack => p.style.sharp += USED_NUDGE,
                Tone::Elegant => p.style.elegant += USED_NUDGE,
            }
            p.events.used += 1;
        })
    }

    /// Record that the listing sold
    ///
    /// # Errors
    /// - Persisting the profile fails
    pub fn record_sold(&mut self, copy: &GeneratedCopy) -> Result<()> {
        let speed = contains_any_word(&copy.long, SPEED_KEYWORDS);
        let elegance = contains_any_word(&copy.long, ELEGANCE_KEYWORDS);
        let long_short = copy.short.chars().count() > SHORT_COPY_THRESHOLD;
        self.profile.update(|p| {
            if speed {
                p.style.sharp += SOLD_NUDGE;
            }
            if elegance {
                p.style.elegant += SOLD_NUDGE;
            }
            if long_short {
                p.style.short += SHORT_NUDGE;
            }
            p.events.sold += 1;
        })
    }

    /// Forget everything learned
    ///
    /// # Errors
    /// - Removing the stored record fails
    pub fn clear(&mut self) -> Result<()> {
        self.profile.clear()
    }
}

impl std::fmt::Debug for CopyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyEngine")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

/// Threshold shifted by `(value - 0.5) * 0.4`
#[must_use]
pub fn biased_threshold(base: f32, value: f32) -> f32 {
    (base + (value - 0.5) * STYLE_BIAS_SCALE).clamp(0.0, 1.0)
}

/// Assemble copy from a given generator state
///
/// Deterministic for identical inputs and generator state.
#[must_use]
pub fn compose(
    mode: CopyMode,
    context: &CopyContext,
    profile: &LearningProfile,
    rng: &mut XorShift32,
) -> GeneratedCopy {
    let tone = match mode {
        CopyMode::Attack => Tone::Attack,
        CopyMode::Elegant => Tone::Elegant,
        CopyMode::Auto => {
            if rng.coin() {
                Tone::Attack
            } else {
                Tone::Elegant
            }
        },
    };

    let (hooks, pacing, closings, tails) = match tone {
        Tone::Attack => (ATTACK_HOOKS, ATTACK_PACING, ATTACK_CLOSINGS, ATTACK_SHORT_TAILS),
        Tone::Elegant => (ELEGANT_HOOKS, ELEGANT_PACING, ELEGANT_CLOSINGS, ELEGANT_SHORT_TAILS),
    };

    let exclaim = rng.next_f32() < biased_threshold(0.5, profile.style.sharp);
    let calm = rng.next_f32() < biased_threshold(0.5, profile.style.elegant);
    let terse = rng.next_f32() < biased_threshold(0.5, profile.style.short);

    let mark = if exclaim { "!" } else { "." };
    let hook = rng.pick(hooks).copied().unwrap_or_default();
    let adjectives = if calm { CALM_ADJECTIVES } else { BRISK_ADJECTIVES };
    let adjective = rng.pick(adjectives).copied().unwrap_or_default();
    let pacing_line = rng
        .pick(pacing)
        .copied()
        .unwrap_or_default()
        .replace("{adj}", adjective);
    let closing = rng.pick(closings).copied().unwrap_or_default();
    let tail = rng.pick(tails).copied().unwrap_or_default();

    let mut long = format!("{}{}\n\n", hook, mark);
    for line in fact_lines(context) {
        long.push_str(&line);
        long.push('\n');
    }
    long.push('\n');
    long.push_str(&format!("{}.\n{}{}", pacing_line, closing, mark));

    let subject = match context.brands.first() {
        Some(brand) => format!("{} {}", brand.brand, context.category),
        None => context.category.clone(),
    };
    let short = if terse {
        format!("{}{}", subject.trim(), mark)
    } else {
        format!("{} - {}{}", subject.trim(), tail, mark)
    };

    GeneratedCopy {
        long,
        short,
        mode,
        tone,
    }
}

fn fact_lines(context: &CopyContext) -> Vec<String> {
    let mut lines = Vec::new();
    if !context.category.trim().is_empty() {
        lines.push(format!("Category: {}", context.category.trim()));
    }
    if let Some(condition) = context.condition.as_deref().filter(|c| !c.trim().is_empty()) {
        lines.push(format!("Condition: {}", condition.trim()));
    }
    if let Some(accessories) = context.accessories.as_deref().filter(|a| !a.trim().is_empty()) {
        lines.push(format!("Includes: {}", accessories.trim()));
    }
    if let Some(brand) = context.brands.first() {
        lines.push(format!(
            "Brand evidence: {} ({:.0}% match)",
            brand.brand,
            brand.score * 100.0
        ));
    }
    if let Some(text) = context.ocr_text.as_deref() {
        let excerpt = ocr_excerpt(text);
        if !excerpt.is_empty() {
            lines.push(format!("Printed text: \"{}\"", excerpt));
        }
    }
    if let Some(size) = context.size {
        lines.push(format!(
            "Approx. size: W {:.1} cm x H {:.1} cm",
            size.width_cm(),
            size.height_cm()
        ));
    }
    lines
}

/// Recognized text collapsed to single spaces and cut to 80 characters
#[must_use]
pub fn ocr_excerpt(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(OCR_EXCERPT_CHARS).collect()
}

fn contains_any_word(text: &str, keywords: &[&str]) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| {
            let word = word.to_lowercase();
            keywords.iter().any(|k| *k == word)
        })
}
