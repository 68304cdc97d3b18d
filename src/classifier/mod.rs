//! Heuristic classification of pasted free text.
//!
//! Decides whether a block of text is a link to a job posting, a job description, a résumé, or
//! none of these, so that the matching guided input flow can be offered. Classification is a
//! total function: weak or absent signals produce [Label::None], never an error.

mod tables;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tables::*;

/// Inputs shorter than this (after trimming) are never classified.
pub const MIN_INPUT_CHARS: usize = 10;

/// A text that fits within this many lines and contains a link is treated as a link.
pub const MAX_URL_LINES: usize = 3;

/// The lowest score at which a label is assigned.
pub const SCORE_THRESHOLD: u32 = 2;

static DEFAULT_CLASSIFIER: Lazy<Classifier> = Lazy::new(Classifier::default);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Url,
    JobDescription,
    Resume,
    None,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Url => "url",
            Label::JobDescription => "job_description",
            Label::Resume => "resume",
            Label::None => "none",
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("Unknown input label: {0}")]
pub struct UnknownLabel(String);

impl FromStr for Label {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(Label::Url),
            "job_description" => Ok(Label::JobDescription),
            "resume" => Ok(Label::Resume),
            "none" => Ok(Label::None),
            other => Err(UnknownLabel(other.to_owned())),
        }
    }
}

/// An entry of a phrase table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Phrase {
    /// Lowercase substring to look for.
    pub text: &'static str,
    /// Added to the score once if the substring occurs anywhere in the input.
    pub weight: u32,
}

impl Phrase {
    pub const fn new(text: &'static str, weight: u32) -> Self {
        Self { text, weight }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Scores {
    pub job_description: u32,
    pub resume: u32,
}

impl Scores {
    /// Applies the decision policy.
    ///
    /// The branches are evaluated in order, so a tie at or above the threshold resolves to
    /// [Label::JobDescription].
    pub fn decide(self) -> Label {
        let Scores {
            job_description: jd,
            resume,
        } = self;
        if jd > resume && jd >= SCORE_THRESHOLD {
            Label::JobDescription
        } else if resume > jd && resume >= SCORE_THRESHOLD {
            Label::Resume
        } else if jd >= SCORE_THRESHOLD {
            Label::JobDescription
        } else if resume >= SCORE_THRESHOLD {
            Label::Resume
        } else {
            Label::None
        }
    }
}

/// Keyword scoring classifier built from two ordered phrase tables.
#[derive(Debug, Clone)]
pub struct Classifier {
    job_description: Vec<Phrase>,
    resume: Vec<Phrase>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(JOB_DESCRIPTION_PHRASES.to_vec(), RESUME_PHRASES.to_vec())
    }
}

impl Classifier {
    /// # Arguments
    ///
    /// * `job_description`: Phrases that indicate a job posting.
    /// * `resume`: Phrases that indicate a résumé.
    pub fn new(job_description: Vec<Phrase>, resume: Vec<Phrase>) -> Self {
        Self {
            job_description,
            resume,
        }
    }

    pub fn classify(&self, text: &str) -> Label {
        let trimmed = text.trim();
        if trimmed.chars().count() < MIN_INPUT_CHARS {
            return Label::None;
        }
        if looks_like_job_url(trimmed) {
            return Label::Url;
        }
        self.score(trimmed).decide()
    }

    /// Phrase table hits plus the structural boosts, without any decision applied.
    pub fn score(&self, text: &str) -> Scores {
        let lower = text.to_lowercase();
        let mut scores = Scores {
            job_description: table_score(&self.job_description, &lower),
            resume: table_score(&self.resume, &lower),
        };

        if distinct_dates(&lower) >= 2 {
            scores.resume += DATE_HISTORY_BOOST;
        }
        if EMAIL.is_match(&lower) {
            scores.resume += EMAIL_BOOST;
        }
        if PHONE.is_match(&lower) {
            scores.resume += PHONE_BOOST;
        }
        if COMPANY_VOICE_PHRASES.iter().any(|p| lower.contains(p)) {
            scores.job_description += COMPANY_VOICE_BOOST;
        }
        scores
    }
}

/// Classifies with the built-in phrase tables.
///
/// # Examples
///
/// ```
/// use careerkit_core::{classify, Label};
///
/// assert_eq!(classify("https://boards.greenhouse.io/acme/jobs/123"), Label::Url);
/// assert_eq!(classify("hi"), Label::None);
/// ```
pub fn classify(text: &str) -> Label {
    DEFAULT_CLASSIFIER.classify(text)
}

/// True when the text contains a link and either points at a known job board, has a jobs or
/// careers path, or is short enough to be little more than the link itself.
pub fn looks_like_job_url(text: &str) -> bool {
    let trimmed = text.trim();
    if !URL.is_match(trimmed) {
        return false;
    }
    let lower = trimmed.to_lowercase();
    JOB_BOARD_DOMAINS.iter().any(|d| lower.contains(d))
        || JOB_PATH_SEGMENTS.iter().any(|p| lower.contains(p))
        || trimmed.lines().count() <= MAX_URL_LINES
}

fn table_score(table: &[Phrase], lower: &str) -> u32 {
    table
        .iter()
        .filter(|phrase| lower.contains(phrase.text))
        .map(|phrase| phrase.weight)
        .sum()
}

// A month-year inside a range ("jan 2019 - present") belongs to that range, not a second date.
fn distinct_dates(lower: &str) -> usize {
    let ranges: Vec<_> = YEAR_RANGE.find_iter(lower).collect();
    let month_years = MONTH_YEAR.find_iter(lower).filter(|m| {
        !ranges
            .iter()
            .any(|r| m.start() < r.end() && r.start() < m.end())
    });
    ranges
        .iter()
        .copied()
        .chain(month_years)
        .map(|m| m.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}
