use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Span of calendar days a batch covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimeframeKind {
    Single,
    Week,
    Month,
}

impl TimeframeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeframeKind::Single => "single",
            TimeframeKind::Week => "week",
            TimeframeKind::Month => "month",
        }
    }
}

impl FromStr for TimeframeKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "day" => Ok(TimeframeKind::Single),
            "week" => Ok(TimeframeKind::Week),
            "month" => Ok(TimeframeKind::Month),
            _ => Err(ParseError::new("timeframe", s)),
        }
    }
}

/// First day of the week used when expanding a `Week` timeframe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeekStart::Monday => "monday",
            WeekStart::Sunday => "sunday",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// No pillar; every job uses the generic content-type parameters.
    Random,
    /// Jobs carry a pillar, fixed or rotating.
    Thesis,
}

impl GenerationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStrategy::Random => "random",
            GenerationStrategy::Thesis => "thesis",
        }
    }
}

impl FromStr for GenerationStrategy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(GenerationStrategy::Random),
            "thesis" => Ok(GenerationStrategy::Thesis),
            _ => Err(ParseError::new("strategy", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Idea,
    KeyPoints,
    FullScript,
}

impl ContentType {
    /// Tag stored on calendar entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Idea => "idea",
            ContentType::KeyPoints => "key_points",
            ContentType::FullScript => "full_script",
        }
    }

    /// Generic focus text used when no pillar overrides it.
    pub fn base_focus(&self) -> &'static str {
        match self {
            ContentType::Idea => "general content idea",
            ContentType::KeyPoints => "key talking points",
            ContentType::FullScript => "complete video script",
        }
    }

    pub fn wants_timing(&self) -> bool {
        matches!(self, ContentType::FullScript)
    }
}

impl FromStr for ContentType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "idea" => Ok(ContentType::Idea),
            "key_points" | "keypoints" => Ok(ContentType::KeyPoints),
            "full_script" | "fullscript" | "script" => Ok(ContentType::FullScript),
            _ => Err(ParseError::new("content type", s)),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BatchStatus {
    Pending,
    Generating,
    Completed,
    Failed,
    Cancelled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Generating => "generating",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled
        )
    }

    /// Position in the forward-only lifecycle. Terminal states share a rank.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            BatchStatus::Pending => 0,
            BatchStatus::Generating => 1,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled => 2,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
