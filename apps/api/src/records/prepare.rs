//! Text preparation shared by job postings and user profiles.
//!
//! `clean_text` lowercases, drops URLs, keeps ASCII letters and whitespace and
//! collapses runs of whitespace. `remove_stopwords` then drops English filler
//! words so embeddings are driven by content terms.

use std::collections::HashSet;
use std::sync::OnceLock;

use tracing::warn;

use crate::records::JobRecord;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "arent", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "cant", "cannot", "could", "couldnt", "did", "didnt", "do", "does",
    "doesnt", "doing", "dont", "down", "during", "each", "few", "for", "from", "further", "had",
    "hadnt", "has", "hasnt", "have", "havent", "having", "he", "hes", "her",
    "here", "heres", "hers", "herself", "him", "himself", "his", "how", "hows", "i",
    "im", "ive", "if", "in", "into", "is", "isnt", "it", "its", "itself", "lets", "me", "more",
    "most", "mustnt", "my", "myself", "no", "nor", "not", "of", "off", "on", "once", "only",
    "or", "other", "ought", "our", "ours", "ourselves", "out", "over", "own", "same", "shant",
    "she", "shes", "should", "shouldnt", "so", "some", "such", "than", "that",
    "thats", "the", "their", "theirs", "them", "themselves", "then", "there", "theres", "these",
    "they", "theyd", "theyll", "theyre", "theyve", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "wasnt", "we", "were", "weve",
    "werent", "what", "whats", "when", "whens", "where", "wheres", "which", "while", "who",
    "whos", "whom", "why", "whys", "will", "with", "wont", "would", "wouldnt", "you", "youd",
    "youll", "youre", "youve", "your", "yours", "yourself", "yourselves",
];

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// Lowercases, strips `http…` URLs, keeps only `[a-z]` and whitespace, and collapses spaces.
pub fn clean_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut kept = String::with_capacity(lower.len());

    let mut rest = lower.as_str();
    while let Some(pos) = rest.find("http") {
        let (before, from_http) = rest.split_at(pos);
        kept.push_str(before);
        let tail = &from_http[4..];
        let url_len = tail
            .find(char::is_whitespace)
            .unwrap_or(tail.len());
        if url_len == 0 {
            // bare "http" with nothing attached is an ordinary word
            kept.push_str("http");
        }
        rest = &tail[url_len..];
    }
    kept.push_str(rest);

    let letters: String = kept
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_whitespace())
        .collect();

    letters.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops English stopwords from already-cleaned text.
pub fn remove_stopwords(text: &str) -> String {
    let set = stopwords();
    text.split_whitespace()
        .filter(|w| !set.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn prepare(text: &str) -> String {
    remove_stopwords(&clean_text(text))
}

/// Builds `job_text_clean` from the descriptive fields of a posting.
pub fn job_text(job: &JobRecord) -> String {
    let combined = [
        job.jobroles.as_str(),
        job.company.as_str(),
        job.category.as_str(),
        job.location.as_str(),
        job.jobdescription.as_str(),
    ]
    .iter()
    .filter(|s| !s.trim().is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" ");
    prepare(&combined)
}

/// Structured profile fields submitted alongside (or instead of) a CV file.
#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub full_name: Option<String>,
    pub headline: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub profiles: Option<String>,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub skills: Option<String>,
    pub certifications: Option<String>,
    pub interests: Option<String>,
    pub projects: Option<String>,
    pub volunteering: Option<String>,
    pub references: Option<String>,
    pub summary: Option<String>,
}

impl ProfileFields {
    /// Assigns a form field by name. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "full_name" | "fullName" => &mut self.full_name,
            "headline" => &mut self.headline,
            "email" => &mut self.email,
            "location" => &mut self.location,
            "profiles" => &mut self.profiles,
            "experience" => &mut self.experience,
            "education" => &mut self.education,
            "skills" => &mut self.skills,
            "certifications" => &mut self.certifications,
            "interests" => &mut self.interests,
            "projects" => &mut self.projects,
            "volunteering" => &mut self.volunteering,
            "references" => &mut self.references,
            "summary" => &mut self.summary,
            _ => return,
        };
        *slot = Some(value);
    }

    fn joined(&self) -> String {
        [
            &self.full_name,
            &self.headline,
            &self.email,
            &self.location,
            &self.profiles,
            &self.experience,
            &self.education,
            &self.skills,
            &self.certifications,
            &self.interests,
            &self.projects,
            &self.volunteering,
            &self.references,
            &self.summary,
        ]
        .iter()
        .filter_map(|f| f.as_deref())
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Structured fields win; CV text is the fallback. Empty when neither has content.
pub fn profile_text(fields: &ProfileFields, cv_text: Option<&str>) -> String {
    let structured = fields.joined();
    if !structured.trim().is_empty() {
        return prepare(&structured);
    }
    match cv_text {
        Some(text) if !text.trim().is_empty() => prepare(text),
        _ => String::new(),
    }
}

/// Extracts plain text from a PDF. Parse failures are logged and yield `None`.
pub fn extract_pdf_text(pdf: &[u8]) -> Option<String> {
    match pdf_extract::extract_text_from_mem(pdf) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to parse CV PDF: {e}");
            None
        }
    }
}
