//! The compression tier catalog.
//!
//! Three fixed profiles trade visual fidelity for size. Each one fixes the
//! rasterisation resolution and the JPEG quality used when a page is
//! re-encoded:
//!
//! | Tier     | DPI | JPEG quality | Use case |
//! |----------|-----|--------------|----------|
//! | `strong` | 72  | 30           | Mail attachments, smallest output |
//! | `medium` | 100 | 50           | Everyday documents (default) |
//! | `weak`   | 150 | 80           | Scans that must stay legible when printed |
//!
//! The catalog is static configuration: tiers are chosen per task at
//! submission time and never change afterwards.

use crate::error::CompressError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named compression profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionTier {
    /// 72 DPI, quality 30.
    Strong,
    /// 100 DPI, quality 50. (default)
    #[default]
    Medium,
    /// 150 DPI, quality 80.
    Weak,
}

impl CompressionTier {
    /// Every tier, strongest first.
    pub const ALL: [CompressionTier; 3] = [
        CompressionTier::Strong,
        CompressionTier::Medium,
        CompressionTier::Weak,
    ];

    /// Rasterisation resolution in dots per inch.
    pub const fn dpi(self) -> u32 {
        match self {
            CompressionTier::Strong => 72,
            CompressionTier::Medium => 100,
            CompressionTier::Weak => 150,
        }
    }

    /// JPEG quality factor (1–100).
    pub const fn quality(self) -> u8 {
        match self {
            CompressionTier::Strong => 30,
            CompressionTier::Medium => 50,
            CompressionTier::Weak => 80,
        }
    }

    /// Wire name, as accepted by [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            CompressionTier::Strong => "strong",
            CompressionTier::Medium => "medium",
            CompressionTier::Weak => "weak",
        }
    }

    /// Short human-readable label.
    pub const fn label(self) -> &'static str {
        match self {
            CompressionTier::Strong => "Strong compression",
            CompressionTier::Medium => "Medium compression",
            CompressionTier::Weak => "Light compression",
        }
    }

    /// One-line description shown next to the label.
    pub const fn description(self) -> &'static str {
        match self {
            CompressionTier::Strong => "Lower quality, greatly reduced size",
            CompressionTier::Medium => "Balanced quality and size",
            CompressionTier::Weak => "High quality, moderate size reduction",
        }
    }

    /// Display metadata for this tier.
    pub fn info(self) -> TierInfo {
        TierInfo {
            name: self,
            dpi: self.dpi(),
            quality: self.quality(),
            label: self.label(),
            description: self.description(),
        }
    }
}

impl fmt::Display for CompressionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionTier {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strong" => Ok(CompressionTier::Strong),
            "medium" => Ok(CompressionTier::Medium),
            "weak" => Ok(CompressionTier::Weak),
            other => Err(CompressError::UnknownTier(other.to_string())),
        }
    }
}

/// Serialisable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierInfo {
    pub name: CompressionTier,
    pub dpi: u32,
    pub quality: u8,
    pub label: &'static str,
    pub description: &'static str,
}

/// The full, static tier catalog.
pub fn catalog() -> Vec<TierInfo> {
    CompressionTier::ALL.iter().map(|t| t.info()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parameters_are_fixed() {
        assert_eq!((CompressionTier::Strong.dpi(), CompressionTier::Strong.quality()), (72, 30));
        assert_eq!((CompressionTier::Medium.dpi(), CompressionTier::Medium.quality()), (100, 50));
        assert_eq!((CompressionTier::Weak.dpi(), CompressionTier::Weak.quality()), (150, 80));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("STRONG".parse::<CompressionTier>().unwrap(), CompressionTier::Strong);
        assert_eq!(" weak ".parse::<CompressionTier>().unwrap(), CompressionTier::Weak);
        assert!(matches!(
            "extreme".parse::<CompressionTier>(),
            Err(CompressError::UnknownTier(_))
        ));
    }

    #[test]
    fn default_is_medium() {
        assert_eq!(CompressionTier::default(), CompressionTier::Medium);
    }

    #[test]
    fn catalog_serialises_lowercase_names() {
        let json = serde_json::to_value(catalog()).unwrap();
        let names: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["strong", "medium", "weak"]);
        assert_eq!(json[0]["dpi"], 72);
    }

    #[test]
    fn stronger_tiers_use_lower_resolution_and_quality() {
        let [s, m, w] = CompressionTier::ALL;
        assert!(s.dpi() < m.dpi() && m.dpi() < w.dpi());
        assert!(s.quality() < m.quality() && m.quality() < w.quality());
    }
}
