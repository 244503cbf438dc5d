//! Content pillars and the rotation used by the thesis strategy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::{GenerationStrategy, ParseError};

/// Color for entries generated without a pillar.
pub const DEFAULT_COLOR: &str = "#6B7280";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentPillar {
    Educate,
    Entertain,
    Inspire,
    Connect,
    Promote,
}

struct PillarSpec {
    label: &'static str,
    focus: &'static str,
    style: &'static str,
    color: &'static str,
}

// Indexed by `ContentPillar::position`.
const TABLE: [PillarSpec; 5] = [
    PillarSpec {
        label: "Educate",
        focus: "teach a practical skill or explain a concept in the niche",
        style: "clear step-by-step tutorial",
        color: "#3B82F6",
    },
    PillarSpec {
        label: "Entertain",
        focus: "a fun, relatable or surprising take on the niche",
        style: "light-hearted storytelling",
        color: "#F59E0B",
    },
    PillarSpec {
        label: "Inspire",
        focus: "a transformation, milestone or motivating story",
        style: "emotive and uplifting",
        color: "#10B981",
    },
    PillarSpec {
        label: "Connect",
        focus: "behind the scenes, opinions and questions for the audience",
        style: "personal and conversational",
        color: "#EC4899",
    },
    PillarSpec {
        label: "Promote",
        focus: "showcase an offer, product or service and its results",
        style: "benefit-driven with a clear call to action",
        color: "#8B5CF6",
    },
];

impl ContentPillar {
    /// Rotation order.
    pub const ALL: [ContentPillar; 5] = [
        ContentPillar::Educate,
        ContentPillar::Entertain,
        ContentPillar::Inspire,
        ContentPillar::Connect,
        ContentPillar::Promote,
    ];

    pub fn position(&self) -> usize {
        match self {
            ContentPillar::Educate => 0,
            ContentPillar::Entertain => 1,
            ContentPillar::Inspire => 2,
            ContentPillar::Connect => 3,
            ContentPillar::Promote => 4,
        }
    }

    fn spec(&self) -> &'static PillarSpec {
        &TABLE[self.position()]
    }

    pub fn label(&self) -> &'static str {
        self.spec().label
    }

    pub fn focus(&self) -> &'static str {
        self.spec().focus
    }

    pub fn style(&self) -> &'static str {
        self.spec().style
    }

    /// Stable hex display color.
    pub fn color(&self) -> &'static str {
        self.spec().color
    }
}

impl fmt::Display for ContentPillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ContentPillar {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ContentPillar::ALL
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseError::new("pillar", s))
    }
}

/// Pillar for the job at `index`. A fixed pillar only applies to the thesis strategy.
pub fn assign(
    index: usize,
    strategy: GenerationStrategy,
    fixed: Option<ContentPillar>,
) -> Option<ContentPillar> {
    match (strategy, fixed) {
        (GenerationStrategy::Random, _) => None,
        (GenerationStrategy::Thesis, Some(pillar)) => Some(pillar),
        (GenerationStrategy::Thesis, None) => {
            Some(ContentPillar::ALL[index % ContentPillar::ALL.len()])
        }
    }
}

pub fn color_for(pillar: Option<ContentPillar>) -> &'static str {
    pillar.map(|p| p.color()).unwrap_or(DEFAULT_COLOR)
}
