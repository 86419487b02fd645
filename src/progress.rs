//! Gamification rules: XP per activity, levels every 100 XP, and badges.
//!
//! The server keeps no learner state. Clients send what they have and get
//! the updated state back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

pub const XP_PER_LEVEL: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    UploadPdf,
    UploadImage,
    UploadText,
    ChatMessage,
    StudyFlashcard,
    CompleteQuiz,
    CreateStudyPlan,
    SemanticSearch,
    GenerateKnowledgeGraph,
}

impl Activity {
    pub const ALL: [Activity; 9] = [
        Activity::UploadPdf,
        Activity::UploadImage,
        Activity::UploadText,
        Activity::ChatMessage,
        Activity::StudyFlashcard,
        Activity::CompleteQuiz,
        Activity::CreateStudyPlan,
        Activity::SemanticSearch,
        Activity::GenerateKnowledgeGraph,
    ];

    pub fn xp(self) -> u32 {
        match self {
            Activity::UploadPdf => 50,
            Activity::UploadImage => 40,
            Activity::UploadText => 30,
            Activity::ChatMessage => 5,
            Activity::StudyFlashcard => 10,
            Activity::CompleteQuiz => 20,
            Activity::CreateStudyPlan => 40,
            Activity::SemanticSearch => 10,
            Activity::GenerateKnowledgeGraph => 30,
        }
    }

    /// Badge earned by repeating this activity, with the count it takes.
    fn badge(self) -> Option<(&'static str, u32)> {
        match self {
            Activity::UploadPdf => Some(("📚 PDF Master", 1)),
            Activity::UploadImage => Some(("🖼️ Image Analyzer", 1)),
            Activity::ChatMessage => Some(("💬 Conversation Master", 10)),
            Activity::StudyFlashcard => Some(("🧠 Flashcard Pro", 50)),
            Activity::SemanticSearch => Some(("🔍 Search Expert", 10)),
            Activity::CreateStudyPlan => Some(("📅 Study Planner", 1)),
            Activity::GenerateKnowledgeGraph => Some(("🕸️ Knowledge Mapper", 1)),
            Activity::CompleteQuiz => Some(("🎓 Quiz Champion", 10)),
            Activity::UploadText => None,
        }
    }
}

pub const AI_EXPLORER: &str = "🌟 AI Explorer";
pub const SPEED_LEARNER: &str = "🚀 Speed Learner";
pub const KNOWLEDGE_HUNTER: &str = "💎 Knowledge Hunter";
pub const MASTER_SCHOLAR: &str = "👑 Master Scholar";

pub fn level_for(xp: u32) -> u32 {
    xp / XP_PER_LEVEL + 1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProgressState {
    #[serde(default)]
    pub xp: u32,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub badges: Vec<String>,
    /// How many times each activity has been done.
    #[serde(default)]
    pub counts: BTreeMap<Activity, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub xp: u32,
    pub level: u32,
    pub leveled_up: bool,
    pub new_badges: Vec<String>,
    pub badges: Vec<String>,
    pub counts: BTreeMap<Activity, u32>,
}

/// Applies one activity to `state`. Badges already held are never re-awarded.
pub fn apply(state: ProgressState, activity: Activity) -> ProgressUpdate {
    let ProgressState { xp, mut badges, mut counts } = state;

    let old_level = level_for(xp);
    let xp = xp.saturating_add(activity.xp());
    let level = level_for(xp);

    let count = counts.entry(activity).or_insert(0);
    *count = count.saturating_add(1);
    let count = *count;

    let mut earned = Vec::new();
    if let Some((badge, needed)) = activity.badge() {
        if count >= needed {
            earned.push(badge);
        }
    }
    if Activity::ALL.iter().all(|a| counts.get(a).copied().unwrap_or(0) > 0) {
        earned.push(AI_EXPLORER);
    }
    if xp >= 500 {
        earned.push(SPEED_LEARNER);
    }
    if level >= 10 {
        earned.push(KNOWLEDGE_HUNTER);
    }
    if level >= 20 {
        earned.push(MASTER_SCHOLAR);
    }

    let mut new_badges = Vec::new();
    for badge in earned {
        if !badges.iter().any(|held| held == badge) {
            badges.push(badge.to_string());
            new_badges.push(badge.to_string());
        }
    }

    ProgressUpdate {
        xp,
        level,
        leveled_up: level > old_level,
        new_badges,
        badges,
        counts,
    }
}
