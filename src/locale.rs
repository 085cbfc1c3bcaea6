use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::{Map, Value};

use crate::config::Config;

/// Message catalogs of every supported locale, loaded once at start.
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    default_locale: String,
    catalogs: HashMap<String, Map<String, Value>>,
}

fn load_catalog(path: &Path) -> Option<Map<String, Value>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!("Unable to open message catalog {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_reader(BufReader::new(file)) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            tracing::warn!("Message catalog {} isn't a JSON object", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Unable to parse message catalog {}: {}", path.display(), e);
            None
        }
    }
}

/// Adds keys from `fallback` that `target` lacks, descending into nested objects.
fn fill_missing(target: &mut Map<String, Value>, fallback: &Map<String, Value>) {
    for (key, value) in fallback {
        match (target.get_mut(key), value) {
            (Some(Value::Object(nested)), Value::Object(fallback_nested)) => {
                fill_missing(nested, fallback_nested)
            }
            (Some(_), _) => {}
            (None, _) => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

impl Catalogs {
    pub fn new(default_locale: impl ToString) -> Catalogs {
        Catalogs {
            default_locale: default_locale.to_string(),
            catalogs: HashMap::new(),
        }
    }

    pub fn load(config: &Config) -> Catalogs {
        let mut catalogs = Catalogs::new(&config.default_locale);
        for locale in &config.locales {
            let path = config.locales_path.join(format!("{}.json", locale));
            let catalog = load_catalog(&path).unwrap_or_default();
            catalogs.insert(locale, catalog);
        }
        tracing::info!("Loaded {} message catalogs", catalogs.catalogs.len());
        catalogs
    }

    pub fn insert(&mut self, locale: impl ToString, catalog: Map<String, Value>) {
        self.catalogs.insert(locale.to_string(), catalog);
    }

    /// Catalog of `locale` with missing keys taken from the default locale.
    pub fn catalog(&self, locale: &str) -> Option<Map<String, Value>> {
        let mut catalog = self.catalogs.get(locale)?.clone();
        if locale != self.default_locale {
            if let Some(fallback) = self.catalogs.get(&self.default_locale) {
                fill_missing(&mut catalog, fallback);
            }
        }
        Some(catalog)
    }
}

/// Best supported locale for an `Accept-Language` header value.
pub fn negotiate<'a>(accept_language: &str, supported: &'a [String]) -> Option<&'a str> {
    let mut ranges: Vec<(&str, f32)> = accept_language
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.trim().split(';');
            let tag = pieces.next()?.trim();
            if tag.is_empty() {
                return None;
            }
            let q = pieces
                .find_map(|it| it.trim().strip_prefix("q="))
                .and_then(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            (q > 0.0).then_some((tag, q))
        })
        .collect();
    // Stable sort keeps header order for equal weights.
    ranges.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    ranges.into_iter().find_map(|(tag, _)| {
        let primary = tag.split('-').next().unwrap_or(tag);
        supported
            .iter()
            .find(|it| it.eq_ignore_ascii_case(tag) || it.eq_ignore_ascii_case(primary))
            .map(String::as_str)
    })
}
