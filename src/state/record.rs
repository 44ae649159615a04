use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a record came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Job that emitted the record
    pub source: String,

    /// Listing page the entity was found on
    pub page: u32,

    /// Key used to merge records describing the same entity
    pub entity_key: String,
}

/// A mapping of field name to value plus provenance
///
/// Every declared field is present; absence is an empty string. Records are
/// never mutated after emission: merging produces a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(flatten)]
    fields: BTreeMap<String, String>,

    #[serde(rename = "_provenance")]
    provenance: Provenance,
}

impl ExtractedRecord {
    pub fn new(fields: BTreeMap<String, String>, provenance: Provenance) -> Self {
        Self { fields, provenance }
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Value of a field, `""` when it was never declared
    pub fn get(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn entity_key(&self) -> &str {
        &self.provenance.entity_key
    }

    /// Combines this record with a later one for the same entity
    ///
    /// A non-empty incoming value replaces an empty or absent one; an empty
    /// incoming value never replaces a non-empty one. The earliest page wins
    /// so the result does not depend on arrival order.
    pub fn merged_with(&self, incoming: &ExtractedRecord) -> ExtractedRecord {
        let mut fields = self.fields.clone();
        for (name, value) in &incoming.fields {
            if value.is_empty() && fields.contains_key(name) {
                continue;
            }
            fields.insert(name.clone(), value.clone());
        }

        let provenance = Provenance {
            source: if self.provenance.source <= incoming.provenance.source {
                self.provenance.source.clone()
            } else {
                incoming.provenance.source.clone()
            },
            page: self.provenance.page.min(incoming.provenance.page),
            entity_key: self.provenance.entity_key.clone(),
        };

        ExtractedRecord { fields, provenance }
    }
}
