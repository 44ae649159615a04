//! The extraction engine: item scopes in, records and drill-down requests out

use crate::config::{DetailConfig, FieldConfig, JobConfig};
use crate::crawler::Document;
use crate::extract::entity::EntityKeyRule;
use crate::extract::strategy::{compile_selector, FieldSpec, Scope};
use crate::extract::{html, json};
use crate::state::{
    ExtractedRecord, Provenance, RequestDescriptor, RequestKind, ResponseEnvelope,
    ENTITY_KEY_CONTEXT,
};
use crate::url::{is_allowed_domain, resolve_against};
use crate::ConfigResult;
use scraper::Selector;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Output of extracting one document
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Records in document order
    pub records: Vec<ExtractedRecord>,

    /// Drill-down requests discovered alongside the records
    pub follow_ups: Vec<RequestDescriptor>,

    /// Item scopes dropped for lacking identifying data
    pub skipped: usize,
}

impl Extraction {
    /// Keeps the first `limit` records and the follow-ups that belong to them
    pub fn truncate(&mut self, limit: usize) {
        if self.records.len() <= limit {
            return;
        }

        self.records.truncate(limit);
        let kept: HashSet<String> = self
            .records
            .iter()
            .map(|r| r.entity_key().to_string())
            .collect();
        self.follow_ups
            .retain(|req| req.entity_key().is_some_and(|key| kept.contains(key)));
    }
}

/// Where items live in a document and which fields each one carries
#[derive(Debug, Clone)]
struct ScopeRules {
    item_scope: Option<Selector>,
    items_path: Vec<String>,
    fields: Vec<FieldSpec>,
}

impl ScopeRules {
    fn compile(
        item_scope: Option<&str>,
        items_path: Option<&str>,
        fields: &[FieldConfig],
    ) -> ConfigResult<Self> {
        let item_scope = match item_scope.map(str::trim).filter(|s| !s.is_empty()) {
            Some(css) => Some(compile_selector(css)?),
            None => None,
        };

        Ok(Self {
            item_scope,
            items_path: items_path.map(json::parse_path).unwrap_or_default(),
            fields: fields
                .iter()
                .map(FieldSpec::compile)
                .collect::<ConfigResult<_>>()?,
        })
    }

    fn scopes<'a>(&self, document: &'a Document) -> Vec<Scope<'a>> {
        match document {
            Document::SemiStructured(dom) => html::item_scopes(dom, self.item_scope.as_ref())
                .into_iter()
                .map(Scope::Element)
                .collect(),
            Document::Structured(payload) => json::items(payload, &self.items_path)
                .into_iter()
                .map(Scope::Item)
                .collect(),
        }
    }

    /// Runs every field's strategies against one scope; `None` marks a miss
    fn extract<'s>(
        &'s self,
        scope: Scope<'_>,
        page_url: &str,
    ) -> Vec<(&'s FieldSpec, Option<String>)> {
        self.fields
            .iter()
            .map(|spec| (spec, spec.extract(scope, page_url)))
            .collect()
    }
}

/// Extraction engine for one job
///
/// Built once from the job's configuration; evaluating a document never
/// fails. Missing fields resolve to their defaults and unidentifiable items
/// are skipped.
#[derive(Debug, Clone)]
pub struct Extractor {
    source: String,
    listing: ScopeRules,
    detail: Option<ScopeRules>,
    entity_key: EntityKeyRule,
    require_fields: Vec<String>,
    constants: BTreeMap<String, String>,
    allowed_domains: Vec<String>,
}

impl Extractor {
    /// Compiles a job's extraction rules
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a CSS query does not compile or a strategy
    /// names no source.
    pub fn from_job(job: &JobConfig) -> ConfigResult<Self> {
        let listing = ScopeRules::compile(
            job.item_scope.as_deref(),
            job.items_path.as_deref(),
            &job.fields,
        )?;

        let detail = job
            .detail
            .as_ref()
            .map(|d: &DetailConfig| {
                ScopeRules::compile(d.item_scope.as_deref(), d.items_path.as_deref(), &d.fields)
            })
            .transpose()?;

        Ok(Self {
            source: job.id.clone(),
            listing,
            detail,
            entity_key: EntityKeyRule::from(&job.entity_key),
            require_fields: job.require_fields.clone(),
            constants: job.constants.clone(),
            allowed_domains: job.allowed_domains.clone(),
        })
    }

    /// Identifier stamped into every record's provenance
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Extracts records from a decoded document
    ///
    /// Listing documents use the job's item scopes and fields and may emit
    /// drill-down requests. Detail documents use the `detail` rules and inherit
    /// the entity key carried in the request context.
    pub fn extract(&self, document: &Document, envelope: &ResponseEnvelope) -> Extraction {
        match envelope.request.kind() {
            RequestKind::Listing => self.extract_listing(document, envelope),
            RequestKind::Detail => self.extract_detail(document, envelope),
        }
    }

    fn extract_listing(&self, document: &Document, envelope: &ResponseEnvelope) -> Extraction {
        let page_url = envelope.final_url.as_str();
        let page = envelope.request.page();
        let mut extraction = Extraction::default();

        for (index, scope) in self.listing.scopes(document).into_iter().enumerate() {
            let hits = self.listing.extract(scope, page_url);

            // identity checks only see extracted values, never defaults
            let mut fields: BTreeMap<String, String> = hits
                .iter()
                .filter_map(|(spec, hit)| Some((spec.name().to_string(), hit.clone()?)))
                .collect();
            for (name, value) in &self.constants {
                fields.entry(name.clone()).or_insert_with(|| value.clone());
            }

            if let Some(missing) = self
                .require_fields
                .iter()
                .find(|name| fields.get(name.as_str()).map_or(true, |v| v.is_empty()))
            {
                debug!(job = %self.source, item = index, field = %missing, "Skipping item without required field");
                extraction.skipped += 1;
                continue;
            }

            let entity_key = self.entity_key.derive(&fields);
            if entity_key.is_empty() {
                debug!(job = %self.source, item = index, "Skipping item without entity key");
                extraction.skipped += 1;
                continue;
            }

            for (spec, _) in hits.iter().filter(|(_, hit)| hit.is_none()) {
                fields
                    .entry(spec.name().to_string())
                    .or_insert_with(|| spec.fallback());
            }

            // only links a strategy produced are followed
            for (_, href) in hits.iter().filter(|(spec, _)| spec.is_drill_down()) {
                let Some(href) = href else { continue };
                if let Some(request) = self.drill_down(href, &fields, &entity_key, page_url, page) {
                    extraction.follow_ups.push(request);
                }
            }

            extraction.records.push(ExtractedRecord::new(
                fields,
                Provenance {
                    source: self.source.clone(),
                    page,
                    entity_key,
                },
            ));
        }

        extraction
    }

    fn drill_down(
        &self,
        href: &str,
        fields: &BTreeMap<String, String>,
        entity_key: &str,
        page_url: &str,
        page: u32,
    ) -> Option<RequestDescriptor> {
        let target = resolve_against(href, page_url)?;

        if !is_allowed_domain(&self.allowed_domains, &target) {
            debug!(job = %self.source, url = %target, "Dropping offsite drill-down");
            return None;
        }

        let mut context = fields.clone();
        context.insert(ENTITY_KEY_CONTEXT.to_string(), entity_key.to_string());
        Some(RequestDescriptor::detail(target, page, context))
    }

    fn extract_detail(&self, document: &Document, envelope: &ResponseEnvelope) -> Extraction {
        let request = &envelope.request;

        let Some(rules) = &self.detail else {
            debug!(job = %self.source, url = %request.url(), "No detail rules, ignoring document");
            return Extraction::default();
        };

        let Some(entity_key) = request.entity_key().filter(|k| !k.is_empty()) else {
            debug!(job = %self.source, url = %request.url(), "Detail request without entity key");
            return Extraction {
                skipped: 1,
                ..Default::default()
            };
        };

        let Some(scope) = rules.scopes(document).into_iter().next() else {
            debug!(job = %self.source, url = %request.url(), "Detail scope not found");
            return Extraction {
                skipped: 1,
                ..Default::default()
            };
        };

        let mut fields: BTreeMap<String, String> = request
            .context()
            .iter()
            .filter(|(name, _)| name.as_str() != ENTITY_KEY_CONTEXT)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        for (spec, hit) in rules.extract(scope, &envelope.final_url) {
            match hit {
                Some(value) => {
                    fields.insert(spec.name().to_string(), value);
                }
                None => {
                    // a default never hides what the listing page carried
                    let carried = fields.get(spec.name()).is_some_and(|v| !v.is_empty());
                    if !carried {
                        fields.insert(spec.name().to_string(), spec.fallback());
                    }
                }
            }
        }

        Extraction {
            records: vec![ExtractedRecord::new(
                fields,
                Provenance {
                    source: self.source.clone(),
                    page: request.page(),
                    entity_key: entity_key.to_string(),
                },
            )],
            ..Default::default()
        }
    }
}
