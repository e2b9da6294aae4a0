//! Portfolio content served to the site and fed to the responder.
//!
//! Every list here has a built-in sample so a fresh install (or a store
//! outage) still renders something sensible.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub headline: String,
    pub summary: String,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tech: Vec<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub name: String,
    pub category: String,
    pub level: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub company: String,
    pub role: String,
    pub period: String,
    pub summary: String,
}

/// Interests, vision cards and background cards share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Interest,
    Vision,
    Background,
}

impl CardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardKind::Interest => "interest",
            CardKind::Vision => "vision",
            CardKind::Background => "background",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
}

pub fn sample_profile() -> Profile {
    Profile {
        name: "Alex Morgan".to_string(),
        headline: "Software engineer building reliable web systems".to_string(),
        summary: "I design and ship backend services and the interfaces on top of them. \
                  Most of my work sits where data modelling, APIs and product meet."
            .to_string(),
        location: Some("Lisbon, Portugal".to_string()),
        avatar_url: None,
    }
}

pub fn sample_projects() -> Vec<Project> {
    vec![
        Project {
            id: "sample-portfolio".to_string(),
            title: "Portfolio with chat assistant".to_string(),
            description: "This site: a portfolio whose assistant answers questions and hands \
                          over to me when I am around."
                .to_string(),
            tech: vec!["Rust".to_string(), "axum".to_string(), "SQLite".to_string()],
            url: None,
        },
        Project {
            id: "sample-ledger".to_string(),
            title: "Household ledger".to_string(),
            description: "Small double-entry bookkeeping tool with CSV import.".to_string(),
            tech: vec!["TypeScript".to_string(), "PostgreSQL".to_string()],
            url: None,
        },
    ]
}

pub fn sample_skills() -> Vec<Skill> {
    [
        ("Rust", "Languages", 4),
        ("TypeScript", "Languages", 4),
        ("SQL", "Data", 4),
        ("System design", "Engineering", 3),
    ]
    .into_iter()
    .map(|(name, category, level)| Skill {
        name: name.to_string(),
        category: category.to_string(),
        level: Some(level),
    })
    .collect()
}

pub fn sample_experiences() -> Vec<Experience> {
    vec![Experience {
        company: "Independent".to_string(),
        role: "Software engineer".to_string(),
        period: "2019 - present".to_string(),
        summary: "Backend and full-stack work for small product teams.".to_string(),
    }]
}

pub fn sample_cards(kind: CardKind) -> Vec<Card> {
    let cards: &[(&str, &str)] = match kind {
        CardKind::Interest => &[
            ("Climbing", "Bouldering most weekends."),
            ("Reading", "Mostly history and science fiction."),
        ],
        CardKind::Vision => &[(
            "Useful software",
            "Tools that stay fast, predictable and pleasant to maintain.",
        )],
        CardKind::Background => &[(
            "Studies",
            "Computer science, with a detour through physics.",
        )],
    };
    cards
        .iter()
        .map(|(title, description)| Card {
            title: title.to_string(),
            description: description.to_string(),
            icon: None,
        })
        .collect()
}

/// Store-backed content reads that degrade to the samples above when the
/// table is empty or the store errors.
#[derive(Clone, Debug)]
pub struct ContentLibrary {
    store: Store,
}

impl ContentLibrary {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn profile(&self) -> Profile {
        match self.store.profile().await {
            Ok(Some(profile)) => profile,
            Ok(None) => sample_profile(),
            Err(e) => {
                warn!("Falling back to sample profile: {:#}", e);
                sample_profile()
            }
        }
    }

    pub async fn projects(&self) -> Vec<Project> {
        or_sample("projects", self.store.projects().await, sample_projects)
    }

    pub async fn skills(&self) -> Vec<Skill> {
        or_sample("skills", self.store.skills().await, sample_skills)
    }

    pub async fn experiences(&self) -> Vec<Experience> {
        or_sample("experiences", self.store.experiences().await, sample_experiences)
    }

    pub async fn cards(&self, kind: CardKind) -> Vec<Card> {
        or_sample(kind.as_str(), self.store.cards(kind).await, || sample_cards(kind))
    }
}

fn or_sample<T>(what: &str, loaded: anyhow::Result<Vec<T>>, sample: impl FnOnce() -> Vec<T>) -> Vec<T> {
    match loaded {
        Ok(items) if !items.is_empty() => items,
        Ok(_) => sample(),
        Err(e) => {
            warn!("Falling back to sample {}: {:#}", what, e);
            sample()
        }
    }
}
