//! Heuristic complexity scoring used to decide whether a task should be
//! split into parallel workers.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Task;

/// Score at which splitting is recommended.
pub const SPLIT_THRESHOLD: u32 = 40;

const COMPONENT_PHRASES: &[&str] = &[
    "frontend and backend",
    "backend and frontend",
    "ui and api",
    "client and server",
    "database and api",
];

const COMPLEXITY_KEYWORDS: &[&str] = &[
    "multiple",
    "several",
    "various",
    "parallel",
    "distributed",
    "orchestrate",
    "coordinate",
    "integrate",
];

/// Outcome of [`analyze_complexity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    pub should_split: bool,
    pub score: u32,
    /// Percentage, capped at 100.
    pub confidence: u32,
    pub reasons: Vec<String>,
}

struct Patterns {
    file_lists: [Regex; 4],
    number: Regex,
    and_word: Regex,
    numbered_item: Regex,
    bullet: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        file_lists: [
            Regex::new(r"\d+\s*files?").expect("valid regex"),
            Regex::new(r"files?:\s*\[").expect("valid regex"),
            Regex::new(r"modify:\s*\[").expect("valid regex"),
            Regex::new(r"change:\s*\[").expect("valid regex"),
        ],
        number: Regex::new(r"\d+").expect("valid regex"),
        and_word: Regex::new(r"\band\b").expect("valid regex"),
        numbered_item: Regex::new(r"(?m)^\s*\d+\.").expect("valid regex"),
        bullet: Regex::new(r"(?m)^\s*[-•*]\s").expect("valid regex"),
    })
}

/// Score a task's title and description for splitting.
pub fn analyze_complexity(task: &Task) -> ComplexityAnalysis {
    analyze_text(&format!("{} {}", task.title, task.description))
}

/// Score free text for splitting.
pub fn analyze_text(text: &str) -> ComplexityAnalysis {
    let text = text.to_lowercase();
    let p = patterns();
    let mut score = 0;
    let mut reasons = Vec::new();

    for pattern in &p.file_lists {
        let Some(found) = pattern.find(&text) else {
            continue;
        };
        match p.number.find(found.as_str()).and_then(|n| n.as_str().parse::<u32>().ok()) {
            Some(files) if files > 3 => {
                score += 30;
                reasons.push(format!("{files} files mentioned"));
                break;
            }
            Some(_) => continue,
            None => {
                score += 20;
                reasons.push("multiple files implied".to_string());
                break;
            }
        }
    }

    if let Some(phrase) = COMPONENT_PHRASES.iter().find(|phrase| text.contains(*phrase)) {
        score += 25;
        reasons.push(format!("cross-component work: {phrase}"));
    }

    let numbered_items = p.numbered_item.find_iter(&text).count();
    let and_count = p.and_word.find_iter(&text).count();
    if numbered_items > 3 {
        score += 20;
        reasons.push(format!("{numbered_items} numbered items"));
    } else if and_count > 2 {
        score += 15;
        reasons.push(format!("{and_count} \"and\" conjunctions"));
    }

    if text.contains("implementation") || text.contains("steps") {
        let steps = p.bullet.find_iter(&text).count();
        if steps > 4 {
            score += 20;
            reasons.push(format!("{steps} implementation steps"));
        }
    }

    let keywords = COMPLEXITY_KEYWORDS
        .iter()
        .filter(|keyword| text.contains(*keyword))
        .count();
    if keywords > 2 {
        score += 15;
        reasons.push(format!("{keywords} complexity indicators"));
    }

    ComplexityAnalysis {
        should_split: score >= SPLIT_THRESHOLD,
        score,
        confidence: score.min(100),
        reasons,
    }
}
