use std::fmt::Write;

use crate::models::{MatchSummary, ResolutionResult};

const MATCHES_HEADER: &str = "Based on your symptoms, here are the most likely conditions:";

/// Markdown shown to the user for one result. Disclaimers are copied verbatim.
pub fn render_markdown(result: &ResolutionResult) -> String {
    match result {
        ResolutionResult::PlainText {
            content,
            disclaimer,
        } => format!("{content}\n\n_{disclaimer}_"),
        ResolutionResult::ExpertMatches {
            matches,
            confidence,
            disclaimer,
        } => {
            let mut out = format!("{MATCHES_HEADER}\n\n");
            push_matches(&mut out, matches);
            let _ = writeln!(out, "Confidence: {}", confidence.as_str());
            let _ = write!(out, "\n_{disclaimer}_");
            out
        }
        ResolutionResult::AiFallback {
            matches,
            ai_summary,
            disclaimer,
        } => {
            let mut out = format!("{MATCHES_HEADER}\n\n");
            push_matches(&mut out, matches);
            let _ = writeln!(out, "**AI insight:** {}", ai_summary.trim());
            let _ = write!(out, "\n_{disclaimer}_");
            out
        }
        ResolutionResult::AiOnly { content } => content.trim().to_string(),
    }
}

fn push_matches(out: &mut String, matches: &[MatchSummary]) {
    for (idx, m) in matches.iter().enumerate() {
        let plural = if m.score == 1 { "" } else { "s" };
        let _ = writeln!(
            out,
            "{}. **{}** (matched {} symptom{plural})",
            idx + 1,
            m.name,
            m.score
        );
        let _ = writeln!(out, "   {}", m.description);
        if !m.symptoms.is_empty() {
            let _ = writeln!(out, "   Typical symptoms: {}...", m.symptoms.join(", "));
        }
        if let Some(question) = &m.question {
            let _ = writeln!(out, "   Follow-up: {question}");
        }
        if !m.precautions.is_empty() {
            let _ = writeln!(out, "   Precautions: {}", m.precautions.join("; "));
        }
        out.push('\n');
    }
}
