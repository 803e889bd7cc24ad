//! Canonical identifiers
//!
//! Deterministic SHA-256 ids for the negotiation graph. Each id hashes its
//! parent id plus normalized descriptive fields, so re-ingesting the same
//! document yields the same nodes.

use chrono::{DateTime, Timelike, Utc};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// NFC-normalize, trim, and collapse internal whitespace runs to one space
pub fn normalize_text(value: &str) -> String {
    let composed: String = value.nfc().collect();
    composed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hash_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"||");
    }
    hex::encode(hasher.finalize())
}

/// ISO-8601 with an explicit offset. Fractional seconds appear only when
/// non-zero, always as six microsecond digits.
fn timestamp(ts: &DateTime<Utc>) -> String {
    let micros = ts.nanosecond() / 1_000 % 1_000_000;
    if micros == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
    } else {
        format!("{}.{:06}{}", ts.format("%Y-%m-%dT%H:%M:%S"), micros, ts.format("%:z"))
    }
}

/// Offsets of zero hash like absent ones
fn offset(value: Option<u64>) -> String {
    match value {
        Some(0) | None => String::new(),
        Some(v) => v.to_string(),
    }
}

pub fn canonical_doc_id(matter_id: &str, title: &str) -> String {
    let title = normalize_text(title).to_lowercase();
    hash_parts([matter_id.trim(), title.as_str()])
}

pub fn canonical_version_id(
    doc_id: &str,
    file_name: &str,
    uploader: &str,
    ts: &DateTime<Utc>,
) -> String {
    let file_name = normalize_text(file_name).to_lowercase();
    let uploader = normalize_text(uploader).to_lowercase();
    let ts = timestamp(ts);
    hash_parts([doc_id, file_name.as_str(), uploader.as_str(), ts.as_str()])
}

/// Offsets and text hash are optional; absent ones, and zero offsets, hash
/// as empty strings.
pub fn canonical_clause_id(
    version_id: &str,
    section_path: &str,
    start_char: Option<u64>,
    end_char: Option<u64>,
    text_hash: Option<&str>,
) -> String {
    let section = normalize_text(section_path).to_lowercase();
    let start = offset(start_char);
    let end = offset(end_char);
    let text_hash = text_hash.unwrap_or_default().to_lowercase();
    hash_parts([
        version_id,
        section.as_str(),
        start.as_str(),
        end.as_str(),
        text_hash.as_str(),
    ])
}

pub fn canonical_recommendation_id(clause_id: &str, issue_type: &str, ts: &DateTime<Utc>) -> String {
    let issue = normalize_text(issue_type).to_lowercase();
    let ts = timestamp(ts);
    hash_parts([clause_id, issue.as_str(), ts.as_str()])
}

pub fn canonical_decision_id(rec_id: &str, actor: &str, ts: &DateTime<Utc>) -> String {
    let actor = normalize_text(actor).to_lowercase();
    let ts = timestamp(ts);
    hash_parts([rec_id, actor.as_str(), ts.as_str()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Master   Services\tAgreement \n"), "Master Services Agreement");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_doc_id_ignores_case_and_spacing() {
        let a = canonical_doc_id("matter_001", "Master Services Agreement");
        let b = canonical_doc_id(" matter_001 ", "  master   services agreement");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, canonical_doc_id("matter_002", "Master Services Agreement"));
    }

    #[test]
    fn test_clause_id_optional_fields() {
        let with_none = canonical_clause_id("v1", "3.1", None, None, None);
        let with_empty = canonical_clause_id("v1", "3.1", None, None, Some(""));
        assert_eq!(with_none, with_empty);
        assert_ne!(with_none, canonical_clause_id("v1", "3.1", Some(0), Some(120), None));
    }

    #[test]
    fn test_parts_are_delimited() {
        // "ab" + "c" must not collide with "a" + "bc"
        assert_ne!(hash_parts(["ab", "c"]), hash_parts(["a", "bc"]));
    }

    #[test]
    fn test_decision_id_depends_on_time() {
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
        let rec = canonical_recommendation_id("clause", "Liability Cap", &ts());
        assert_eq!(rec, canonical_recommendation_id("clause", "liability  cap", &ts()));
        assert_ne!(
            canonical_decision_id(&rec, "Sarah Chen", &ts()),
            canonical_decision_id(&rec, "Sarah Chen", &later)
        );
        let version = canonical_version_id("doc", "MSA v2.docx", "Sarah Chen", &ts());
        assert_eq!(version, canonical_version_id("doc", "msa v2.docx", "sarah chen", &ts()));
    }

    #[test]
    fn test_zero_offset_hashes_as_absent() {
        assert_eq!(
            canonical_clause_id("v1", "3.1", Some(0), Some(120), None),
            "fc94aec69304bf69179149a8bbfeb7fe8833a9711a6104dbd0b3626131655cae"
        );
        assert_eq!(
            canonical_clause_id("v1", "3.1", None, None, None),
            "4e976ba49d6e5f1a96d2bfaf79c748ad893c000f1c9fbfef8f8389ab5ae40b10"
        );
    }

    #[test]
    fn test_timestamp_format() {
        let frac = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(timestamp(&ts()), "2024-03-01T10:00:00+00:00");
        assert_eq!(timestamp(&frac), "2024-03-01T10:00:00.123000+00:00");
        assert_eq!(
            canonical_decision_id("rec", "Sarah Chen", &ts()),
            "ce33ccb44a44449af6176ebf7fceb194ac7f219daa2098a13763b2408cd640d0"
        );
        assert_eq!(
            canonical_decision_id("rec", "Sarah Chen", &frac),
            "a062fe441a6f73e6765410f9e9177d1c8f38b16f9be1ef3b924a6c300960c6d7"
        );
    }

    #[test]
    fn test_composed_and_decomposed_titles_agree() {
        let composed = canonical_doc_id("matter_001", "Caf\u{e9} Agreement");
        let decomposed = canonical_doc_id("matter_001", "Cafe\u{301} Agreement");
        assert_eq!(composed, decomposed);
        assert_eq!(
            composed,
            "b93ced9d09637c34caf50c7594d43053ea77ee7924fd11aa3511645d034f742a"
        );
    }
}
