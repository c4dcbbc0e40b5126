//! Merriam-Webster response parsing
//!
//! Pure functions over the raw provider JSON. The response is an array of
//! entry objects (`meta.id`, `meta.stems`, `hwi.hw`, `hwi.prs[].sound.audio`,
//! `fl`, `shortdef`, `uros[].prs[].sound.audio`) or, for unknown words, an
//! array of suggestion strings.

use serde::Serialize;
use serde_json::Value;

use crate::repos::definitions::DefinitionSet;

/// Per-bucket cap keeps the editor popup compact.
const MAX_DEFS_PER_BUCKET: usize = 7;
/// Grammar blocks show at most this many definitions per part of speech.
const MAX_GRAMMAR_DEFS: usize = 3;

/// Normalize an MW token for matching: lowercase, drop syllable markers and
/// punctuation ("be*side" matches "beside").
fn norm_token(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn str_field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = value;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_str()
}

/// Select the entry that actually describes `term`:
/// 1. `meta.id` equals the term (ignoring `:1` disambiguation)
/// 2. headword equals the term (ignoring syllable markers)
/// 3. the term appears in the entry's stems
pub fn pick_main_entry<'a>(entries: &'a [Value], term: &str) -> Option<&'a Value> {
    let t = norm_token(term);

    for e in entries {
        if let Some(mid) = str_field(e, &["meta", "id"]) {
            let mid0 = mid.split(':').next().unwrap_or("");
            if norm_token(mid0) == t {
                return Some(e);
            }
        }
    }

    for e in entries {
        if let Some(hw) = str_field(e, &["hwi", "hw"]) {
            if norm_token(hw) == t {
                return Some(e);
            }
        }
    }

    for e in entries {
        if let Some(stems) = e.get("meta").and_then(|m| m.get("stems")).and_then(|s| s.as_array()) {
            if stems
                .iter()
                .filter_map(|s| s.as_str())
                .any(|s| norm_token(s) == t)
            {
                return Some(e);
            }
        }
    }

    None
}

fn collect_audio_from_prs(prs: Option<&Value>, out: &mut Vec<String>) {
    let Some(prs) = prs.and_then(|p| p.as_array()) else {
        return;
    };
    for p in prs {
        if let Some(aid) = str_field(p, &["sound", "audio"]) {
            let aid = aid.trim();
            if !aid.is_empty() {
                out.push(aid.to_string());
            }
        }
    }
}

/// Audio ids from one entry: headword pronunciations first, then derived
/// forms (`uros`). Deduplicated preserving order.
pub fn collect_audio_ids(entry: &Value) -> Vec<String> {
    let mut found = Vec::new();

    collect_audio_from_prs(entry.get("hwi").and_then(|h| h.get("prs")), &mut found);

    if let Some(uros) = entry.get("uros").and_then(|u| u.as_array()) {
        for u in uros {
            collect_audio_from_prs(u.get("prs"), &mut found);
        }
    }

    dedup_preserving_order(found)
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|x| seen.insert(x.clone())).collect()
}

/// Audio extraction over a whole response: main entry only.
pub fn extract_audio(entries: &[Value], term: &str) -> (Option<String>, Vec<String>) {
    let Some(main) = pick_main_entry(entries, term) else {
        return (None, Vec::new());
    };
    let audio_ids = collect_audio_ids(main);
    let audio_main = audio_ids.first().cloned();
    (audio_main, audio_ids)
}

fn bucket_from_fl(fl: &str) -> &'static str {
    match fl.trim().to_lowercase().as_str() {
        "noun" => "noun",
        "verb" => "verb",
        "adjective" | "adj." | "adj" => "adjective",
        "adverb" | "adv." | "adv" => "adverb",
        _ => "other",
    }
}

fn definition_buckets(entry: &Value, defs: &mut DefinitionSet) {
    let bucket = bucket_from_fl(entry.get("fl").and_then(|f| f.as_str()).unwrap_or(""));
    let Some(shortdefs) = entry.get("shortdef").and_then(|s| s.as_array()) else {
        return;
    };

    let target = match bucket {
        "noun" => &mut defs.noun,
        "verb" => &mut defs.verb,
        "adjective" => &mut defs.adjective,
        "adverb" => &mut defs.adverb,
        _ => &mut defs.other,
    };

    let mut seen: std::collections::HashSet<String> =
        target.iter().map(|d| d.to_lowercase()).collect();
    for d in shortdefs.iter().filter_map(|d| d.as_str()) {
        let d = d.trim();
        if d.is_empty() || target.len() >= MAX_DEFS_PER_BUCKET {
            continue;
        }
        if seen.insert(d.to_lowercase()) {
            target.push(d.to_string());
        }
    }
}

/// Build a cacheable [`DefinitionSet`] from a raw MW response.
///
/// Returns `None` only on shape errors. A suggestion list (unknown word)
/// produces an empty bucketed set so the next lookup is cheap. Definitions
/// and audio come from the main entry only; unrelated homographs are noise.
pub fn parse_definition_set(data: &Value, term: &str) -> Option<DefinitionSet> {
    let entries = data.as_array()?;
    let raw_json = serde_json::to_string(data).ok();

    let mut defs = DefinitionSet {
        raw_json,
        ..Default::default()
    };

    let Some(first) = entries.first() else {
        // Empty list is unusual, but still worth caching.
        return Some(defs);
    };

    if first.is_string() {
        // Suggestions mode
        return Some(defs);
    }
    if !first.is_object() {
        return None;
    }

    let main = pick_main_entry(entries, term).unwrap_or(first);
    definition_buckets(main, &mut defs);

    defs.audio_ids = collect_audio_ids(main);
    defs.audio_main = defs.audio_ids.first().cloned();
    Some(defs)
}

// ============================================================================
// GRAMMAR (lemma, stems, per-POS blocks, etymology)
// ============================================================================

/// One part-of-speech block of the grammar popup
#[derive(Debug, Clone, Serialize)]
pub struct PosBlock {
    pub pos: String,
    pub defs: Vec<String>,
    pub more: usize,
}

/// Compact grammar summary derived from the stored raw response
#[derive(Debug, Clone, Serialize)]
pub struct Grammar {
    pub word: String,
    pub stems: Vec<String>,
    pub pos_blocks: Vec<PosBlock>,
    pub etymology: String,
}

/// Strip MW inline markup: `{bc}`, `{it}…{/it}`, `{sx|…}` and friends.
fn clean_markup(s: &str) -> String {
    let s = s.replace("{ldquo}", "\"").replace("{rdquo}", "\"");
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn base_word(entry: &Value) -> String {
    str_field(entry, &["meta", "id"])
        .map(|id| id.split(':').next().unwrap_or("").trim().to_string())
        .unwrap_or_default()
}

fn entry_stems(entry: &Value) -> Vec<String> {
    entry
        .get("meta")
        .and_then(|m| m.get("stems"))
        .and_then(|s| s.as_array())
        .map(|s| {
            s.iter()
                .filter_map(|x| x.as_str())
                .map(|x| x.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn pos_rank(pos: &str) -> (usize, String) {
    let rank = match pos {
        "Noun" => 0,
        "Verb" => 1,
        "Adjective" => 2,
        "Adverb" => 3,
        _ => 99,
    };
    (rank, pos.to_string())
}

/// Derive a grammar summary for `term` from a stored `raw_json` payload.
pub fn grammar_from_raw(raw: &str, term: &str) -> Option<Grammar> {
    let data: Value = serde_json::from_str(raw).ok()?;
    let items = data.as_array()?;
    if items.is_empty() || !items[0].is_object() {
        return None;
    }

    let term_l = term.to_lowercase();

    // 1) Pick the lemma: the entry whose stems (or base word) carry the term.
    let mut lemma = String::new();
    for it in items {
        let stems: Vec<String> = entry_stems(it).iter().map(|s| s.to_lowercase()).collect();
        let bw = base_word(it).to_lowercase();
        if stems.contains(&term_l) || term_l == bw {
            lemma = base_word(it);
            break;
        }
    }
    if lemma.is_empty() {
        lemma = base_word(&items[0]);
    }
    if lemma.is_empty() {
        lemma = term.to_string();
    }
    let lemma_l = lemma.to_lowercase();

    // 2) Keep only entries of that lemma.
    let rel: Vec<&Value> = items
        .iter()
        .filter(|it| base_word(it).to_lowercase() == lemma_l)
        .collect();
    if rel.is_empty() {
        return None;
    }

    let stems = entry_stems(rel[0]);

    // 3) Group cleaned definitions by POS, unique, stable POS order.
    let mut pos_defs: Vec<(String, Vec<String>)> = Vec::new();
    for it in &rel {
        let Some(fl) = it.get("fl").and_then(|f| f.as_str()) else {
            continue;
        };
        let pos = capitalize(fl.trim());
        if pos.is_empty() {
            continue;
        }
        let Some(sd) = it.get("shortdef").and_then(|s| s.as_array()) else {
            continue;
        };
        let idx = match pos_defs.iter().position(|(p, _)| *p == pos) {
            Some(i) => i,
            None => {
                pos_defs.push((pos, Vec::new()));
                pos_defs.len() - 1
            }
        };
        let slot = &mut pos_defs[idx].1;
        for x in sd.iter().filter_map(|x| x.as_str()) {
            let d = clean_markup(x);
            if !d.is_empty() && !slot.contains(&d) {
                slot.push(d);
            }
        }
    }
    pos_defs.sort_by_key(|(pos, _)| pos_rank(pos));

    let pos_blocks: Vec<PosBlock> = pos_defs
        .into_iter()
        .map(|(pos, defs)| {
            let shown: Vec<String> = defs.iter().take(MAX_GRAMMAR_DEFS).cloned().collect();
            let more = defs.len().saturating_sub(shown.len());
            PosBlock { pos, defs: shown, more }
        })
        .collect();

    // 4) Etymology: first `et` text run among the relevant entries.
    let mut etymology = String::new();
    for it in &rel {
        if let Some(et) = it.get("et").and_then(|e| e.as_array()) {
            let parts: Vec<String> = et
                .iter()
                .filter_map(|chunk| chunk.as_array())
                .filter(|chunk| chunk.len() >= 2 && chunk[0].as_str() == Some("text"))
                .filter_map(|chunk| chunk[1].as_str().map(clean_markup))
                .filter(|p| !p.is_empty())
                .collect();
            etymology = parts.join(" ");
            if !etymology.is_empty() {
                break;
            }
        }
    }

    let grammar = Grammar {
        word: lemma,
        stems,
        pos_blocks,
        etymology,
    };
    if grammar.stems.is_empty() && grammar.pos_blocks.is_empty() && grammar.etymology.is_empty() {
        return None;
    }
    Some(grammar)
}
