use std::fmt::Write;

use crate::content::{Card, CardKind, ContentLibrary, Experience, Profile, Project, Skill};

use super::intent::{DisplayDirective, Intent};

/// Profile summary length in the general bundle.
const GENERAL_SUMMARY_CHARS: usize = 600;
const GENERAL_PROJECTS: usize = 3;
const GENERAL_SKILLS: usize = 12;
const GENERAL_EXPERIENCES: usize = 2;
/// List cap for a single-topic bundle.
const TOPIC_ITEMS: usize = 10;

/// The slice of portfolio content sent along with one visitor message.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponderContext {
    pub text: String,
    pub display: Option<DisplayDirective>,
}

/// Select content for an intent. Total over `Intent`; `None` gets a
/// capped mix of everything.
pub async fn assemble(library: &ContentLibrary, intent: Option<Intent>) -> ResponderContext {
    let mut text = String::new();

    let display = match intent {
        None => {
            let profile = library.profile().await;
            write_profile(&mut text, &profile, Some(GENERAL_SUMMARY_CHARS));
            write_projects(&mut text, &take(library.projects().await, GENERAL_PROJECTS));
            write_skills(&mut text, &take(library.skills().await, GENERAL_SKILLS));
            write_experiences(&mut text, &take(library.experiences().await, GENERAL_EXPERIENCES));
            None
        }
        Some(Intent::AboutMe) => {
            write_profile(&mut text, &library.profile().await, None);
            Some(DisplayDirective::ShowProfile)
        }
        Some(Intent::WorkHistory) => {
            write_experiences(&mut text, &take(library.experiences().await, TOPIC_ITEMS));
            Some(DisplayDirective::ShowExperience)
        }
        Some(Intent::Skills) => {
            write_skills(&mut text, &take(library.skills().await, TOPIC_ITEMS));
            Some(DisplayDirective::ShowSkills)
        }
        Some(Intent::Projects) => {
            let projects = take(library.projects().await, TOPIC_ITEMS);
            write_projects(&mut text, &projects);
            Some(DisplayDirective::ShowProjects {
                project_ids: projects.into_iter().map(|p| p.id).collect(),
            })
        }
        Some(Intent::Interests) => {
            write_cards(&mut text, "Interests", &take(library.cards(CardKind::Interest).await, TOPIC_ITEMS));
            Some(DisplayDirective::ShowInterests)
        }
        Some(Intent::Vision) => {
            write_cards(&mut text, "Vision", &take(library.cards(CardKind::Vision).await, TOPIC_ITEMS));
            Some(DisplayDirective::ShowVision)
        }
        Some(Intent::Background) => {
            let profile = library.profile().await;
            let _ = writeln!(text, "{}: {}\n", profile.name, profile.headline);
            write_cards(
                &mut text,
                "Background",
                &take(library.cards(CardKind::Background).await, TOPIC_ITEMS),
            );
            Some(DisplayDirective::ShowBackground)
        }
    };

    ResponderContext {
        text: text.trim_end().to_string(),
        display,
    }
}

fn take<T>(mut items: Vec<T>, n: usize) -> Vec<T> {
    items.truncate(n);
    items
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn write_profile(out: &mut String, profile: &Profile, summary_cap: Option<usize>) {
    let summary = match summary_cap {
        Some(cap) => truncate_chars(&profile.summary, cap),
        None => profile.summary.clone(),
    };
    let _ = writeln!(out, "## About {}", profile.name);
    let _ = writeln!(out, "{}", profile.headline);
    if let Some(location) = &profile.location {
        let _ = writeln!(out, "Based in {}", location);
    }
    let _ = writeln!(out, "{}\n", summary);
}

fn write_projects(out: &mut String, projects: &[Project]) {
    let _ = writeln!(out, "## Projects");
    for p in projects {
        let _ = write!(out, "- {}: {}", p.title, p.description);
        if !p.tech.is_empty() {
            let _ = write!(out, " (tech: {})", p.tech.join(", "));
        }
        if let Some(url) = &p.url {
            let _ = write!(out, " <{}>", url);
        }
        out.push('\n');
    }
    out.push('\n');
}

fn write_skills(out: &mut String, skills: &[Skill]) {
    let _ = writeln!(out, "## Skills");
    for s in skills {
        match s.level {
            Some(level) => {
                let _ = writeln!(out, "- {} ({}, level {}/5)", s.name, s.category, level);
            }
            None => {
                let _ = writeln!(out, "- {} ({})", s.name, s.category);
            }
        }
    }
    out.push('\n');
}

fn write_experiences(out: &mut String, experiences: &[Experience]) {
    let _ = writeln!(out, "## Experience");
    for e in experiences {
        let _ = writeln!(out, "- {} at {} ({}): {}", e.role, e.company, e.period, e.summary);
    }
    out.push('\n');
}

fn write_cards(out: &mut String, heading: &str, cards: &[Card]) {
    let _ = writeln!(out, "## {}", heading);
    for c in cards {
        let _ = writeln!(out, "- {}: {}", c.title, c.description);
    }
    out.push('\n');
}
