use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ContentType;
use crate::pillar::ContentPillar;

/// Generator credentials, forwarded untouched with every request.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub date: NaiveDate,
    pub focus: String,
    pub style: Option<String>,
    pub length: String,
    pub tone: String,
    pub content_type: ContentType,
    pub include_timing: bool,
    pub pillar: Option<ContentPillar>,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSegment {
    pub label: String,
    pub seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedIdea {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub timing: Vec<TimingSegment>,
}

impl GeneratedIdea {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: String::new(),
            body: None,
            key_points: Vec::new(),
            timing: Vec::new(),
        }
    }
}
