//! Upload filename convention shared with the server-side endpoints.
//!
//! `base = participant || sessionId || random id`, then `_<runLabel>` and
//! `_set<N>` unless the base already ends with them, then a
//! `YYYYMMDD_HHMMSS` timestamp and the extension.

use chrono::NaiveDateTime;
use clockex_core::SessionMeta;
use rand::Rng;

/// Alphabet for generated ids; visually ambiguous characters are left out.
pub const RANDOM_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const RANDOM_ID_LEN: usize = 5;

/// Limit for a single user-supplied name component.
pub const NAME_COMPONENT_MAX: usize = 50;
/// Limit for interaction-log session ids.
pub const SESSION_ID_MAX: usize = 80;
/// Limit for a complete filename.
pub const FILENAME_MAX: usize = 120;

const STRIPPED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '#', '&', '%'];

/// Trims, collapses whitespace runs to `_`, strips path and shell
/// metacharacters, and truncates to `max_chars` characters.
pub fn sanitize(s: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        if STRIPPED.contains(&c) {
            continue;
        }
        out.push(c);
    }
    out.chars().take(max_chars).collect()
}

pub fn random_id<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| RANDOM_ID_ALPHABET[rng.random_range(0..RANDOM_ID_ALPHABET.len())] as char)
        .collect()
}

pub fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

fn ends_with_run_label(base: &str) -> bool {
    ["_check", "_A", "_B"].iter().any(|suffix| base.ends_with(suffix))
}

fn ends_with_set(base: &str) -> bool {
    let digits = base.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && base[..base.len() - digits].ends_with("_set")
}

/// Filename base without timestamp or extension.
pub fn filename_base<R: Rng + ?Sized>(meta: &SessionMeta, rng: &mut R) -> String {
    let participant = meta
        .participant
        .as_deref()
        .map(|p| sanitize(p, NAME_COMPONENT_MAX))
        .unwrap_or_default();
    let session_id = meta
        .session_id
        .as_deref()
        .map(|s| sanitize(s, SESSION_ID_MAX))
        .unwrap_or_default();

    let mut base = if !participant.is_empty() {
        participant
    } else if !session_id.is_empty() {
        session_id
    } else {
        random_id(rng, RANDOM_ID_LEN)
    };

    if let Some(label) = meta.run_label {
        if !ends_with_run_label(&base) {
            base.push('_');
            base.push_str(label.as_str());
        }
    }
    if let Some(set) = meta.set {
        if !ends_with_set(&base) {
            base.push_str(&format!("_set{set}"));
        }
    }
    base
}

pub fn build_filename<R: Rng + ?Sized>(
    meta: &SessionMeta,
    extension: &str,
    now: NaiveDateTime,
    rng: &mut R,
) -> String {
    let base = filename_base(meta, rng);
    let ts = meta
        .ts
        .as_deref()
        .map(|ts| sanitize(ts, NAME_COMPONENT_MAX))
        .filter(|ts| !ts.is_empty())
        .unwrap_or_else(|| format_timestamp(&now));
    format!("{base}_{ts}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clockex_core::RunLabel;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 31)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap()
    }

    #[test]
    fn participant_label_and_set_are_appended() {
        let meta = SessionMeta::for_set("alice", 1, RunLabel::A);
        let name = build_filename(&meta, "json", at(), &mut StdRng::seed_from_u64(1));
        assert_eq!(name, "alice_A_set1_20250131_090507.json");
    }

    #[test]
    fn existing_suffixes_are_not_doubled() {
        let meta = SessionMeta::for_set("alice_A", 1, RunLabel::A);
        let name = build_filename(&meta, "json", at(), &mut StdRng::seed_from_u64(1));
        assert_eq!(name, "alice_A_set1_20250131_090507.json");

        let meta = SessionMeta::for_set("bob_check_set3", 3, RunLabel::Check);
        let name = build_filename(&meta, "webm", at(), &mut StdRng::seed_from_u64(1));
        assert_eq!(name, "bob_check_set3_20250131_090507.webm");
    }

    #[test]
    fn session_id_is_used_without_participant() {
        let meta = SessionMeta {
            session_id: Some("QW3RT_set2".into()),
            run_label: Some(RunLabel::B),
            set: Some(2),
            ..SessionMeta::default()
        };
        let name = build_filename(&meta, "json", at(), &mut StdRng::seed_from_u64(1));
        assert_eq!(name, "QW3RT_set2_B_set2_20250131_090507.json");
    }

    #[test]
    fn long_session_id_is_cut_at_its_own_limit() {
        let meta = SessionMeta {
            session_id: Some("s".repeat(90)),
            ..SessionMeta::default()
        };
        let name = build_filename(&meta, "json", at(), &mut StdRng::seed_from_u64(1));
        let base = name.strip_suffix("_20250131_090507.json").unwrap();
        assert_eq!(base.len(), SESSION_ID_MAX);

        let meta = SessionMeta {
            participant: Some("p".repeat(90)),
            ..SessionMeta::default()
        };
        let name = build_filename(&meta, "json", at(), &mut StdRng::seed_from_u64(1));
        let base = name.strip_suffix("_20250131_090507.json").unwrap();
        assert_eq!(base.len(), NAME_COMPONENT_MAX);
    }

    #[test]
    fn random_base_when_nothing_identifies_the_session() {
        let meta = SessionMeta {
            participant: Some("  ".into()),
            ..SessionMeta::default()
        };
        let name = build_filename(&meta, "json", at(), &mut StdRng::seed_from_u64(7));
        let base = name.strip_suffix("_20250131_090507.json").unwrap();
        assert_eq!(base.len(), RANDOM_ID_LEN);
        assert!(base.bytes().all(|b| RANDOM_ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn shared_timestamp_overrides_clock() {
        let mut meta = SessionMeta::for_set("alice", 2, RunLabel::B);
        meta.ts = Some("20240101_000000".into());
        let name = build_filename(&meta, "json", at(), &mut StdRng::seed_from_u64(1));
        assert_eq!(name, "alice_B_set2_20240101_000000.json");
    }

    #[test]
    fn sanitize_collapses_space_and_strips_metacharacters() {
        assert_eq!(sanitize("  山田 太郎  ", 50), "山田_太郎");
        assert_eq!(sanitize("a / b", 50), "a__b");
        assert_eq!(sanitize("x\t\n y", 50), "x_y");
        assert_eq!(sanitize(r#"../etc\pass:w*d?"<>|#&%"#, 50), "..etcpasswd");
        assert_eq!(sanitize("abcdefgh", 5), "abcde");
        assert_eq!(sanitize("あいうえおかきくけこ", 3), "あいう");
    }

    #[test]
    fn set_suffix_detection_needs_digits() {
        assert!(ends_with_set("x_set12"));
        assert!(!ends_with_set("x_set"));
        assert!(!ends_with_set("x_sett1"));
    }
}
