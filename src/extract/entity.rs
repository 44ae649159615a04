//! Entity-key derivation

use crate::config::EntityKeyConfig;
use crate::url::path_segment_from_end;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const HASH_FIELD_SEPARATOR: char = '\u{1f}';
const HASH_HEX_LEN: usize = 16;

/// How records of one job are matched to the entity they describe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKeyRule {
    /// The value of a field
    Field(String),

    /// The `from_end`-th path segment of the URL held in a field (1 = last)
    Segment { field: String, from_end: usize },

    /// A truncated SHA-256 of the named fields
    Hash(Vec<String>),
}

impl From<&EntityKeyConfig> for EntityKeyRule {
    fn from(config: &EntityKeyConfig) -> Self {
        match config {
            EntityKeyConfig::Field { field } => Self::Field(field.clone()),
            EntityKeyConfig::Segment { field, segment } => Self::Segment {
                field: field.clone(),
                from_end: *segment,
            },
            EntityKeyConfig::Hash { hash } => Self::Hash(hash.clone()),
        }
    }
}

impl EntityKeyRule {
    /// Field names the rule reads
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Field(field) | Self::Segment { field, .. } => vec![field.as_str()],
            Self::Hash(fields) => fields.iter().map(String::as_str).collect(),
        }
    }

    /// Derives the key from a record's fields; empty means "not a real item"
    pub fn derive(&self, fields: &BTreeMap<String, String>) -> String {
        let value_of = |name: &str| fields.get(name).map(|v| v.trim()).unwrap_or("");

        match self {
            Self::Field(field) => value_of(field).to_string(),
            Self::Segment { field, from_end } => {
                path_segment_from_end(value_of(field), *from_end).unwrap_or_default()
            }
            Self::Hash(names) => {
                if names.iter().all(|name| value_of(name).is_empty()) {
                    return String::new();
                }

                let material = names
                    .iter()
                    .map(|name| format!("{}={}", name, value_of(name)))
                    .collect::<Vec<_>>()
                    .join(&HASH_FIELD_SEPARATOR.to_string());

                let digest = hex::encode(Sha256::digest(material.as_bytes()));
                digest[..HASH_HEX_LEN].to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_field_rule() {
        let rule = EntityKeyRule::Field("id".to_string());
        assert_eq!(rule.derive(&fields(&[("id", " 7 ")])), "7");
        assert_eq!(rule.derive(&fields(&[("name", "Beta")])), "");
    }

    #[test]
    fn test_segment_rule() {
        let second_last = EntityKeyRule::Segment {
            field: "url".to_string(),
            from_end: 2,
        };
        let record = fields(&[("url", "https://myanimelist.net/character/417/Lelouch")]);
        assert_eq!(second_last.derive(&record), "417");

        let last = EntityKeyRule::Segment {
            field: "url".to_string(),
            from_end: 1,
        };
        assert_eq!(last.derive(&fields(&[("url", "https://anime.gf/characters/rem")])), "rem");
        assert_eq!(last.derive(&fields(&[("url", "")])), "");
    }

    #[test]
    fn test_hash_rule_is_stable() {
        let rule = EntityKeyRule::Hash(vec!["name".to_string(), "anime".to_string()]);
        let a = rule.derive(&fields(&[("name", "Rem"), ("anime", "Re:Zero")]));
        let b = rule.derive(&fields(&[("anime", "Re:Zero"), ("name", "Rem"), ("x", "y")]));

        assert_eq!(a.len(), HASH_HEX_LEN);
        assert_eq!(a, b);
        assert_ne!(a, rule.derive(&fields(&[("name", "Ram"), ("anime", "Re:Zero")])));
    }

    #[test]
    fn test_hash_rule_separates_fields() {
        let rule = EntityKeyRule::Hash(vec!["a".to_string(), "b".to_string()]);
        assert_ne!(
            rule.derive(&fields(&[("a", "xy"), ("b", "")])),
            rule.derive(&fields(&[("a", "x"), ("b", "y")]))
        );
    }

    #[test]
    fn test_hash_rule_empty_when_all_empty() {
        let rule = EntityKeyRule::Hash(vec!["name".to_string()]);
        assert_eq!(rule.derive(&fields(&[("name", "  ")])), "");
    }

    #[test]
    fn test_from_config() {
        let config = EntityKeyConfig::Segment {
            field: "url".to_string(),
            segment: 1,
        };
        assert_eq!(
            EntityKeyRule::from(&config),
            EntityKeyRule::Segment {
                field: "url".to_string(),
                from_end: 1
            }
        );
        assert_eq!(EntityKeyRule::from(&config).fields(), vec!["url"]);
    }
}
