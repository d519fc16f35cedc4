//! Tier table: the process-wide envelope configuration
//!
//! Built once at startup, validated, then shared read-only (usually behind an
//! `Arc`) by every assessor and orchestrator run.

use crate::assessment::types::{ComplexityTier, ResourceEnvelope};
use crate::errors::{Result, TierGateError};
use serde::{Deserialize, Serialize};

/// Envelope per tier. Deserialization runs the same validation as `new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedTierTable")]
pub struct TierTable {
    simple: ResourceEnvelope,
    medium: ResourceEnvelope,
    complex: ResourceEnvelope,
}

#[derive(Deserialize)]
struct UncheckedTierTable {
    simple: ResourceEnvelope,
    medium: ResourceEnvelope,
    complex: ResourceEnvelope,
}

impl TryFrom<UncheckedTierTable> for TierTable {
    type Error = TierGateError;

    fn try_from(raw: UncheckedTierTable) -> Result<Self> {
        TierTable::new(raw.simple, raw.medium, raw.complex)
    }
}

impl TierTable {
    /// Build a table from three envelopes, validating each one
    pub fn new(
        simple: ResourceEnvelope,
        medium: ResourceEnvelope,
        complex: ResourceEnvelope,
    ) -> Result<Self> {
        simple.validate()?;
        medium.validate()?;
        complex.validate()?;

        Ok(Self {
            simple,
            medium,
            complex,
        })
    }

    /// Envelope for a tier
    pub fn envelope(&self, tier: ComplexityTier) -> &ResourceEnvelope {
        match tier {
            ComplexityTier::Simple => &self.simple,
            ComplexityTier::Medium => &self.medium,
            ComplexityTier::Complex => &self.complex,
        }
    }

    /// Envelope for a tier given by name
    pub fn envelope_by_name(&self, name: &str) -> Result<&ResourceEnvelope> {
        let tier: ComplexityTier = name.parse()?;
        Ok(self.envelope(tier))
    }

    /// Iterate `(tier, envelope)` pairs in ascending tier order
    pub fn iter(&self) -> impl Iterator<Item = (ComplexityTier, &ResourceEnvelope)> {
        ComplexityTier::ALL
            .into_iter()
            .map(move |tier| (tier, self.envelope(tier)))
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            simple: ResourceEnvelope::default_for(ComplexityTier::Simple),
            medium: ResourceEnvelope::default_for(ComplexityTier::Medium),
            complex: ResourceEnvelope::default_for(ComplexityTier::Complex),
        }
    }
}
