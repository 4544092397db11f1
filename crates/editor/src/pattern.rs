//! Pattern Highlighting
//!
//! Regex highlighter built from a language configuration, for languages
//! without a compiled-in grammar.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::EditorError;
use crate::language::LanguageConfiguration;
use crate::syntax::{HighlightRange, HighlightType};

struct Rule {
    category: String,
    regex: Regex,
    highlight_type: HighlightType,
}

/// Comments and strings claim text before anything else can
fn tier(highlight_type: HighlightType) -> usize {
    match highlight_type {
        HighlightType::Comment | HighlightType::String => 0,
        HighlightType::Annotation | HighlightType::Number | HighlightType::Macro | HighlightType::Operator => 1,
        HighlightType::Keyword | HighlightType::Type | HighlightType::Constant => 2,
        HighlightType::Function => 3,
    }
}

/// Regex highlighter
pub struct PatternHighlighter {
    tiers: Vec<Vec<Rule>>,
}

impl PatternHighlighter {
    /// Compile every keyword category and pattern of `config`
    pub fn from_config(config: &LanguageConfiguration) -> Result<Self, EditorError> {
        let mut tiers: Vec<Vec<Rule>> = (0..4).map(|_| Vec::new()).collect();

        for (category, source) in &config.patterns {
            let Some(highlight_type) = HighlightType::from_category(category) else {
                warn!("Skipping pattern with unknown category '{}'", category);
                continue;
            };
            let regex = Regex::new(source).map_err(|source| EditorError::InvalidPattern {
                category: category.clone(),
                source,
            })?;
            tiers[tier(highlight_type)].push(Rule {
                category: category.clone(),
                regex,
                highlight_type,
            });
        }

        for (category, words) in &config.keywords {
            if words.is_empty() {
                continue;
            }
            let Some(highlight_type) = HighlightType::from_category(category) else {
                warn!("Skipping keyword list with unknown category '{}'", category);
                continue;
            };
            let alternation = words
                .iter()
                .map(|w| regex::escape(w))
                .collect::<Vec<_>>()
                .join("|");
            let regex = Regex::new(&format!(r"\b(?:{})\b", alternation)).map_err(|source| {
                EditorError::InvalidPattern {
                    category: category.clone(),
                    source,
                }
            })?;
            tiers[tier(highlight_type)].push(Rule {
                category: category.clone(),
                regex,
                highlight_type,
            });
        }

        let highlighter = Self { tiers };
        debug!(
            "Pattern highlighter for {} with {} rules",
            config.name,
            highlighter.rule_count()
        );
        Ok(highlighter)
    }

    pub fn rule_count(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    /// Categories in the order they get to claim text
    pub fn categories(&self) -> Vec<&str> {
        self.tiers
            .iter()
            .flatten()
            .map(|rule| rule.category.as_str())
            .collect()
    }

    /// Sorted, non-overlapping highlights for `text`
    pub fn highlight(&self, text: &str) -> Vec<HighlightRange> {
        // start -> (end, type)
        let mut claimed: BTreeMap<usize, (usize, HighlightType)> = BTreeMap::new();

        for rules in &self.tiers {
            let mut next = vec![Next::Unknown; rules.len()];
            let mut pos = 0;
            while pos < text.len() {
                let Some((found, highlight_type)) = earliest_match(rules, &mut next, text, pos) else {
                    break;
                };

                if found.end > found.start && !overlaps(&claimed, found.start, found.end) {
                    claimed.insert(found.start, (found.end, highlight_type));
                    pos = found.end;
                } else {
                    pos = found.start + text[found.start..].chars().next().map_or(1, char::len_utf8);
                }
            }
        }

        claimed
            .into_iter()
            .map(|(start, (end, highlight_type))| HighlightRange {
                start,
                end,
                highlight_type,
            })
            .collect()
    }
}

/// One rule's next match: where the whole match begins, and the span to highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Found {
    from: usize,
    start: usize,
    end: usize,
}

/// Per-rule search state within one tier
#[derive(Debug, Clone, Copy)]
enum Next {
    Unknown,
    At(Found),
    Exhausted,
}

/// A rule with a capture group highlights only the first group
fn find_from(rule: &Rule, text: &str, pos: usize) -> Next {
    let Some(captures) = rule.regex.captures_at(text, pos) else {
        return Next::Exhausted;
    };
    let Some(whole) = captures.get(0) else {
        return Next::Exhausted;
    };
    let m = captures.get(1).unwrap_or(whole);
    Next::At(Found {
        from: whole.start(),
        start: m.start(),
        end: m.end(),
    })
}

/// Leftmost match of any rule at or after `pos`; ties go to the earlier rule.
///
/// A cached match that begins at or after `pos` is still that rule's leftmost
/// one, so a rule is searched again only once `pos` has moved past it.
fn earliest_match(
    rules: &[Rule],
    next: &mut [Next],
    text: &str,
    pos: usize,
) -> Option<(Found, HighlightType)> {
    let mut best: Option<(Found, HighlightType)> = None;

    for (rule, slot) in rules.iter().zip(next.iter_mut()) {
        let stale = match slot {
            Next::Unknown => true,
            Next::At(found) => found.from < pos,
            Next::Exhausted => false,
        };
        if stale {
            *slot = find_from(rule, text, pos);
        }
        if let Next::At(found) = *slot {
            if best.map_or(true, |(b, _)| found.start < b.start) {
                best = Some((found, rule.highlight_type));
            }
        }
    }

    best
}

fn overlaps(claimed: &BTreeMap<usize, (usize, HighlightType)>, start: usize, end: usize) -> bool {
    if let Some((_, (prev_end, _))) = claimed.range(..=start).next_back() {
        if *prev_end > start {
            return true;
        }
    }
    claimed.range(start..end).next().is_some()
}
