use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Visual style requested for a preview mesh
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtStyle {
    #[default]
    Realistic,
    Sculpture,
    Pbr,
}

impl ArtStyle {
    /// Name for display
    pub fn name(&self) -> &'static str {
        match self {
            Self::Realistic => "Realistic",
            Self::Sculpture => "Sculpture",
            Self::Pbr => "PBR",
        }
    }

    /// Value sent to the vendor
    pub fn id(&self) -> &'static str {
        match self {
            Self::Realistic => "realistic",
            Self::Sculpture => "sculpture",
            Self::Pbr => "pbr",
        }
    }

    pub fn all() -> [ArtStyle; 3] {
        [Self::Realistic, Self::Sculpture, Self::Pbr]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    #[default]
    Quad,
    Triangle,
}

impl Topology {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Quad => "Quad",
            Self::Triangle => "Triangle",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Quad => "quad",
            Self::Triangle => "triangle",
        }
    }

    pub fn all() -> [Topology; 2] {
        [Self::Quad, Self::Triangle]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SymmetryMode {
    Off,
    #[default]
    Auto,
    On,
}

impl SymmetryMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Auto => "Auto",
            Self::On => "On",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Auto => "auto",
            Self::On => "on",
        }
    }

    pub fn all() -> [SymmetryMode; 3] {
        [Self::Off, Self::Auto, Self::On]
    }
}

/// Mesh density tier, mapped to a `target_polycount`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PolycountLevel {
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl PolycountLevel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Ultra => "Ultra",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }

    pub fn target_polycount(&self) -> u32 {
        match self {
            Self::Low => 5_000,
            Self::Medium => 15_000,
            Self::High => 30_000,
            Self::Ultra => 50_000,
        }
    }

    pub fn all() -> [PolycountLevel; 4] {
        [Self::Low, Self::Medium, Self::High, Self::Ultra]
    }
}

macro_rules! parse_by_id {
    ($ty:ident, $what:literal) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::all()
                    .into_iter()
                    .find(|v| v.id().eq_ignore_ascii_case(s))
                    .ok_or_else(|| {
                        let known: Vec<&str> = $ty::all().iter().map(|v| v.id()).collect();
                        format!("unknown {} '{}' (expected one of: {})", $what, s, known.join(", "))
                    })
            }
        }
    };
}

parse_by_id!(ArtStyle, "art style");
parse_by_id!(Topology, "topology");
parse_by_id!(SymmetryMode, "symmetry mode");
parse_by_id!(PolycountLevel, "polycount level");

/// Everything the option panel collects besides the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub art_style: ArtStyle,
    /// `None` lets the vendor pick a random seed.
    pub seed: Option<u64>,
    pub topology: Topology,
    pub symmetry: SymmetryMode,
    pub polycount: PolycountLevel,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            art_style: ArtStyle::default(),
            seed: Some(42),
            topology: Topology::default(),
            symmetry: SymmetryMode::default(),
            polycount: PolycountLevel::default(),
        }
    }
}
