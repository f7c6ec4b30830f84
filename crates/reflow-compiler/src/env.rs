//! Compilation environment
//!
//! Carries the externally supplied classification tables the analyses
//! depend on: which calls inject reactivity into a function, and which
//! calls return values whose identity is stable across invocations.
//!
//! The stable-value table is deliberately a configurable allowlist rather
//! than something re-derived structurally: misclassifying an entry changes
//! memoization correctness, not just performance.

use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

/// How a call's result stays stable between invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StableKind {
    /// The whole result has a stable identity (e.g. a ref cell)
    Identity,
    /// The result destructures into a changing value and a stable setter;
    /// the second binding position is stable
    SetterPair,
}

/// Serialized form of [`Environment`]
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    /// Call targets that inject reactivity into the calling function
    #[serde(default)]
    pub reactive_sources: Vec<String>,
    /// Call targets returning (partially) stable values
    #[serde(default)]
    pub stable_values: FxHashMap<String, StableKind>,
    /// Optional name prefix classifying calls as reactivity sources even
    /// when not listed explicitly
    #[serde(default)]
    pub source_prefix: Option<String>,
}

static DEFAULT_STABLE_VALUES: Lazy<FxHashMap<String, StableKind>> = Lazy::new(|| {
    let mut table = FxHashMap::default();
    table.insert("useRef".to_string(), StableKind::Identity);
    table.insert("useState".to_string(), StableKind::SetterPair);
    table.insert("useReducer".to_string(), StableKind::SetterPair);
    table
});

/// Classification tables consumed by reactivity inference
#[derive(Debug, Clone)]
pub struct Environment {
    reactive_sources: FxHashSet<String>,
    stable_values: FxHashMap<String, StableKind>,
    source_prefix: Option<String>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            reactive_sources: FxHashSet::default(),
            stable_values: DEFAULT_STABLE_VALUES.clone(),
            source_prefix: Some("use".to_string()),
        }
    }
}

impl Environment {
    /// Build an environment from its serialized configuration
    pub fn from_config(config: EnvironmentConfig) -> Self {
        Self {
            reactive_sources: config.reactive_sources.into_iter().collect(),
            stable_values: config.stable_values,
            source_prefix: config.source_prefix,
        }
    }

    /// Parse an environment from a JSON configuration document
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<EnvironmentConfig>(source).map(Self::from_config)
    }

    /// An environment with no classifications at all (useful in tests)
    pub fn empty() -> Self {
        Self {
            reactive_sources: FxHashSet::default(),
            stable_values: FxHashMap::default(),
            source_prefix: None,
        }
    }

    /// Register a call target as a reactivity source
    pub fn add_reactive_source(&mut self, name: impl Into<String>) {
        self.reactive_sources.insert(name.into());
    }

    /// Register a call target as returning a stable value
    pub fn add_stable_value(&mut self, name: impl Into<String>, kind: StableKind) {
        self.stable_values.insert(name.into(), kind);
    }

    /// Whether a call to `name` injects reactivity into the caller
    pub fn is_reactive_source(&self, name: &str) -> bool {
        if self.reactive_sources.contains(name) {
            return true;
        }
        match &self.source_prefix {
            Some(prefix) => {
                name.starts_with(prefix.as_str())
                    && name[prefix.len()..].starts_with(|c: char| c.is_ascii_uppercase())
            }
            None => false,
        }
    }

    /// Stability classification for a call to `name`, if any
    pub fn stable_kind(&self, name: &str) -> Option<StableKind> {
        self.stable_values.get(name).copied()
    }
}
