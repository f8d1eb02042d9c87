use crate::knowledge::KnowledgeBase;
use crate::models::{ConditionEntry, ConfidenceLevel, MatchSummary};

const NAME_MATCH_BONUS: u32 = 5;
const CONFIDENCE_THRESHOLD: u32 = 2;
const TOP_MATCHES: usize = 2;
const SUMMARY_SYMPTOMS: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct ScoredMatch<'a> {
    pub condition: &'a ConditionEntry,
    pub score: u32,
}

/// Name bonus when any token is a substring of the condition name, plus one per symptom
/// containing at least one token.
pub fn score(entry: &ConditionEntry, tokens: &[String]) -> u32 {
    let name = entry.display_name().to_lowercase();
    let name_match = tokens.iter().any(|token| name.contains(token.as_str()));

    let symptom_matches = entry
        .symptoms
        .iter()
        .filter(|symptom| {
            let symptom = symptom.to_lowercase();
            tokens.iter().any(|token| symptom.contains(token.as_str()))
        })
        .count() as u32;

    let bonus = if name_match { NAME_MATCH_BONUS } else { 0 };
    bonus + symptom_matches
}

/// Scores every entry, drops zero scores and sorts descending. The sort is stable, so equal
/// scores keep knowledge base order.
pub fn rank<'a>(kb: &'a KnowledgeBase, tokens: &[String]) -> Vec<ScoredMatch<'a>> {
    let mut scored: Vec<ScoredMatch<'a>> = kb
        .entries()
        .iter()
        .map(|condition| ScoredMatch {
            condition,
            score: score(condition, tokens),
        })
        .filter(|m| m.score > 0)
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

pub fn top_matches(ranked: &[ScoredMatch<'_>]) -> Vec<MatchSummary> {
    ranked.iter().take(TOP_MATCHES).map(summarize).collect()
}

pub fn summarize(scored: &ScoredMatch<'_>) -> MatchSummary {
    let entry = scored.condition;
    let name = entry.display_name();
    let summary = match entry.symptoms.first() {
        Some(first) => format!("{name} often involves {first} and related issues."),
        None => format!("{name} often involves several symptoms and related issues."),
    };

    MatchSummary {
        name,
        score: scored.score,
        description: entry.description.clone(),
        symptoms: entry.symptoms.iter().take(SUMMARY_SYMPTOMS).cloned().collect(),
        question: entry.questions.first().cloned(),
        summary,
        precautions: entry.precautions.clone(),
    }
}

/// `None` when nothing matched.
pub fn classify(top: &[MatchSummary]) -> Option<ConfidenceLevel> {
    let best = top.first()?;
    if best.score >= CONFIDENCE_THRESHOLD {
        Some(ConfidenceLevel::MediumHigh)
    } else {
        Some(ConfidenceLevel::Low)
    }
}
