//! Read-only translation tables
//!
//! `language -> key -> string`. Lookups fall back to English, then to the
//! key itself, so a missing entry never breaks rendering.

use std::collections::HashMap;

/// Language used when a key is missing in the requested one
pub const FALLBACK_LANGUAGE: &str = "en";

const BUILTIN: &[(&str, &[(&str, &str)])] = &[
    (
        "en",
        &[
            ("status.deployed", "Deployed"),
            ("status.inProgress", "In Progress"),
            ("status.signed", "Signed"),
            ("popup.address", "Address"),
            ("popup.status", "Status"),
            ("popup.website", "Website"),
            ("popup.visitWebsite", "Visit website"),
            ("stats.total", "Total"),
            ("stats.visible", "Visible"),
            ("notice.rateLimited", "Too many requests. Please slow down."),
        ],
    ),
    (
        "fr",
        &[
            ("status.deployed", "Déployé"),
            ("status.inProgress", "En cours"),
            ("status.signed", "Signé"),
            ("popup.address", "Adresse"),
            ("popup.status", "Statut"),
            ("popup.website", "Site web"),
            ("popup.visitWebsite", "Visiter le site"),
            ("stats.total", "Total"),
            ("stats.visible", "Visibles"),
        ],
    ),
];

/// Translation dictionary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translations {
    tables: HashMap<String, HashMap<String, String>>,
}

impl Translations {
    /// Empty dictionary; every lookup returns the key
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in English and French tables
    pub fn builtin() -> Self {
        let tables = BUILTIN
            .iter()
            .map(|(lang, entries)| {
                let table = entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                (lang.to_string(), table)
            })
            .collect();
        Self { tables }
    }

    /// Parse `{"en": {"key": "value"}, ...}`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let tables = serde_json::from_str(json)?;
        Ok(Self { tables })
    }

    /// Overlay `other` on top of this dictionary
    pub fn merge(mut self, other: Translations) -> Self {
        for (lang, table) in other.tables {
            self.tables.entry(lang).or_default().extend(table);
        }
        self
    }

    /// Look up `key` in `lang`, falling back to English and then the key
    pub fn get<'a>(&'a self, lang: &str, key: &'a str) -> &'a str {
        self.lookup(lang, key)
            .or_else(|| self.lookup(FALLBACK_LANGUAGE, key))
            .unwrap_or(key)
    }

    /// Languages with at least one entry, sorted
    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }

    fn lookup(&self, lang: &str, key: &str) -> Option<&str> {
        self.tables.get(lang)?.get(key).map(String::as_str)
    }
}
