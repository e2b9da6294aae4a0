use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a visitor is asking about. Sent by the front end as a hint; the
/// absence of one selects the general bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AboutMe,
    WorkHistory,
    Skills,
    Projects,
    Interests,
    Vision,
    Background,
}

impl Intent {
    pub const ALL: [Intent; 7] = [
        Intent::AboutMe,
        Intent::WorkHistory,
        Intent::Skills,
        Intent::Projects,
        Intent::Interests,
        Intent::Vision,
        Intent::Background,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::AboutMe => "about_me",
            Intent::WorkHistory => "work_history",
            Intent::Skills => "skills",
            Intent::Projects => "projects",
            Intent::Interests => "interests",
            Intent::Vision => "vision",
            Intent::Background => "background",
        }
    }

    /// Lenient parse for request fields: unknown or blank hints become `None`.
    pub fn from_hint(hint: Option<&str>) -> Option<Intent> {
        hint.and_then(|h| h.parse().ok())
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    /// Accepts `work_history`, `work-history` and `Work History` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Intent::ALL
            .into_iter()
            .find(|intent| intent.as_str() == normalized)
            .ok_or_else(|| format!("unknown intent: {}", s))
    }
}

/// Which rich block the front end shows beside a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayDirective {
    ShowProfile,
    ShowExperience,
    ShowSkills,
    ShowProjects {
        #[serde(rename = "projectIds")]
        project_ids: Vec<String>,
    },
    ShowInterests,
    ShowVision,
    ShowBackground,
}
