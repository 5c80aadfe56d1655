//! Model id → token counter resolution.
//!
//! Unknown models never fail: they resolve to [`DEFAULT_PROFILE`].

use std::collections::HashMap;
use std::sync::Arc;

use super::counter::{HeuristicTokenCounter, SharedTokenCounter};

/// A named counting profile shared by a family of models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenizerProfile {
    pub name: &'static str,
    pub chars_per_token: f64,
}

pub const O200K_PROFILE: TokenizerProfile = TokenizerProfile {
    name: "o200k_base",
    chars_per_token: 4.2,
};

pub const CL100K_PROFILE: TokenizerProfile = TokenizerProfile {
    name: "cl100k_base",
    chars_per_token: 4.0,
};

/// General-purpose profile used when a model id is not recognised.
pub const DEFAULT_PROFILE: TokenizerProfile = CL100K_PROFILE;

/// Known model prefixes. Longest matching prefix wins.
pub const KNOWN_MODEL_PROFILES: &[(&str, TokenizerProfile)] = &[
    ("gpt-4.1", O200K_PROFILE),
    ("gpt-4o", O200K_PROFILE),
    ("gpt-5", O200K_PROFILE),
    ("o1", O200K_PROFILE),
    ("o3", O200K_PROFILE),
    ("o4", O200K_PROFILE),
    ("gpt-4", CL100K_PROFILE),
    ("gpt-3.5-turbo", CL100K_PROFILE),
    ("text-embedding-3", CL100K_PROFILE),
];

#[derive(Debug, Clone, Default)]
pub struct TokenizerRegistry {
    /// Exact-id overrides, checked before the built-in prefixes
    overrides: HashMap<String, TokenizerProfile>,
}

impl TokenizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, model: impl Into<String>, profile: TokenizerProfile) -> Self {
        self.overrides.insert(model.into(), profile);
        self
    }

    /// Look up the profile for a model id.
    ///
    /// # Matching Strategy
    /// 1. Exact override
    /// 2. Longest built-in prefix
    pub fn lookup(&self, model: &str) -> Option<TokenizerProfile> {
        if let Some(profile) = self.overrides.get(model) {
            return Some(*profile);
        }

        KNOWN_MODEL_PROFILES
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, profile)| *profile)
    }

    /// Resolve a profile, falling back to the default for unknown models.
    pub fn profile_for(&self, model: &str) -> TokenizerProfile {
        self.lookup(model).unwrap_or_else(|| {
            log::debug!(
                "No tokenizer profile for model '{}', using {}",
                model,
                DEFAULT_PROFILE.name
            );
            DEFAULT_PROFILE
        })
    }

    pub fn counter_for(&self, model: &str) -> SharedTokenCounter {
        let profile = self.profile_for(model);
        Arc::new(HeuristicTokenCounter::new(profile.chars_per_token, 1.0))
    }
}
