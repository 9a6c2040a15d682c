//! Pasted-list importer.
//!
//! One contact per line: a bare phone, or `name, phone` / `phone, name`
//! separated by comma, pipe or tab. Field order is guessed per line: when the
//! first field carries more than eight digits it is taken as the phone.
//! Short local numbers typed first are therefore read as names; this is the
//! intended behavior for header-less lists.

use std::sync::OnceLock;

use regex::Regex;

use crate::{
    domain::Contact,
    phone::{digits_only, normalize, MIN_PHONE_DIGITS},
};

/// Digit count above which the first field is treated as the phone.
const PHONE_FIRST_DIGITS: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedEntry {
    /// Phone field as typed (trimmed).
    pub raw: String,
    /// Canonical phone.
    pub phone: String,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub entries: Vec<ParsedEntry>,
    /// Non-empty lines dropped because no usable phone was found.
    pub dropped: usize,
}

fn separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,|\t]").expect("valid regex"))
}

/// Parse pasted text into entries, silently dropping unusable lines.
pub fn parse(text: &str) -> Vec<ParsedEntry> {
    parse_report(text).entries
}

/// Like [`parse`], but also counts the lines that were dropped.
pub fn parse_report(text: &str) -> ImportReport {
    let mut report = ImportReport::default();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match parse_line(line) {
            Some(entry) => report.entries.push(entry),
            None => report.dropped += 1,
        }
    }

    report
}

fn parse_line(line: &str) -> Option<ParsedEntry> {
    let parts: Vec<&str> = separator().split(line).collect();

    let (raw_phone, name) = match parts.as_slice() {
        [first, second, ..] => {
            if digits_only(first).len() > PHONE_FIRST_DIGITS {
                (*first, *second)
            } else {
                (*second, *first)
            }
        }
        _ => (line, ""),
    };

    let phone = normalize(raw_phone);
    if phone.len() < MIN_PHONE_DIGITS {
        return None;
    }

    let name = name.trim();
    Some(ParsedEntry {
        raw: raw_phone.trim().to_string(),
        phone,
        name: (!name.is_empty()).then(|| name.to_string()),
    })
}

impl From<ParsedEntry> for Contact {
    fn from(entry: ParsedEntry) -> Self {
        Contact::new(entry.raw, entry.phone, entry.name)
    }
}

/// Build fresh pending contacts from parsed entries.
pub fn contacts_from_entries(entries: Vec<ParsedEntry>) -> Vec<Contact> {
    entries.into_iter().map(Contact::from).collect()
}
