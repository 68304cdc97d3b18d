use crate::classifier::Phrase;
use once_cell::sync::Lazy;
use regex::Regex;

pub(super) const JOB_DESCRIPTION_PHRASES: &[Phrase] = &[
    Phrase::new("responsibilities", 1),
    Phrase::new("requirements", 1),
    Phrase::new("qualifications", 1),
    Phrase::new("we are looking for", 1),
    Phrase::new("job description", 1),
    Phrase::new("about the role", 1),
    Phrase::new("what you'll do", 1),
    Phrase::new("who you are", 1),
    Phrase::new("nice to have", 1),
    Phrase::new("the ideal candidate", 1),
    Phrase::new("benefits", 1),
    Phrase::new("compensation", 1),
    Phrase::new("salary", 1),
    Phrase::new("apply now", 1),
    Phrase::new("equal opportunity employer", 1),
    Phrase::new("years of experience", 1),
    Phrase::new("full-time", 1),
];

pub(super) const RESUME_PHRASES: &[Phrase] = &[
    Phrase::new("experience", 1),
    Phrase::new("education", 1),
    Phrase::new("skills", 1),
    Phrase::new("work history", 1),
    Phrase::new("employment history", 1),
    Phrase::new("professional summary", 1),
    Phrase::new("objective", 1),
    Phrase::new("certifications", 1),
    Phrase::new("projects", 1),
    Phrase::new("references", 1),
    Phrase::new("bachelor", 1),
    Phrase::new("master of", 1),
    Phrase::new("gpa", 1),
    Phrase::new("achievements", 1),
];

/// Any one of these present adds [COMPANY_VOICE_BOOST] to the job description score.
pub(super) const COMPANY_VOICE_PHRASES: &[&str] = &["we offer", "our team", "you will"];

pub(super) const JOB_BOARD_DOMAINS: &[&str] = &[
    "linkedin.com/jobs",
    "indeed.com",
    "glassdoor.com",
    "greenhouse.io",
    "lever.co",
    "myworkdayjobs.com",
    "workday.com",
    "ziprecruiter.com",
    "monster.com",
    "wellfound.com",
    "angel.co",
    "smartrecruiters.com",
    "ashbyhq.com",
    "dice.com",
    "simplyhired.com",
];

pub(super) const JOB_PATH_SEGMENTS: &[&str] = &["/jobs/", "/careers/"];

pub(super) const DATE_HISTORY_BOOST: u32 = 3;
pub(super) const EMAIL_BOOST: u32 = 2;
pub(super) const PHONE_BOOST: u32 = 2;
pub(super) const COMPANY_VOICE_BOOST: u32 = 2;

pub(super) static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bhttps?://\S+|\bwww\.\S+|\b[a-z0-9-]+(?:\.[a-z0-9-]+)*\.(?:com|org|net|io|co|ai|dev|app|jobs|careers|us|uk|ca|de)/\S*",
    )
    .unwrap()
});

pub(super) static YEAR_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:19|20)\d{2}\s*[-–—]\s*(?:(?:19|20)\d{2}|present|current|now)\b").unwrap()
});

pub(super) static MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(?:19|20)\d{2}\b",
    )
    .unwrap()
});

pub(super) static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").unwrap());

pub(super) static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}\b").unwrap()
});
