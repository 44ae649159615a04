//! Compiled field specifications and their fallback strategy chains

use crate::config::{FieldConfig, StrategyConfig};
use crate::extract::{html, json};
use crate::url::resolve_against;
use crate::{ConfigError, ConfigResult};
use scraper::{ElementRef, Selector};
use serde_json::Value;
use tracing::trace;

const DEFAULT_SEPARATOR: &str = ",";

/// The region of a document a field is evaluated against
#[derive(Clone, Copy)]
pub(crate) enum Scope<'a> {
    Element(ElementRef<'a>),
    Item(&'a Value),
}

/// One way of obtaining a value
#[derive(Debug, Clone)]
pub enum Strategy {
    /// CSS query relative to the scope; `None` is the scope element itself
    Css {
        selector: Option<Selector>,
        attr: Option<String>,
    },
    /// Dot path relative to a structured item
    Path(Vec<String>),
    /// The document's final URL
    PageUrl,
}

impl Strategy {
    fn compile(config: &StrategyConfig) -> ConfigResult<Self> {
        if let Some(css) = &config.css {
            let css = css.trim();
            let selector = if css.is_empty() {
                None
            } else {
                Some(compile_selector(css)?)
            };
            return Ok(Self::Css {
                selector,
                attr: config.attr.clone(),
            });
        }

        if let Some(path) = &config.path {
            return Ok(Self::Path(json::parse_path(path)));
        }

        if config.page_url {
            return Ok(Self::PageUrl);
        }

        Err(ConfigError::Validation(
            "strategy must set one of css, path or page-url".to_string(),
        ))
    }

    /// Raw candidate values, or `None` if the strategy does not apply to the scope
    fn candidates(&self, scope: Scope<'_>, page_url: &str) -> Option<Vec<String>> {
        match (self, scope) {
            (Self::Css { selector, attr }, Scope::Element(element)) => Some(html::element_values(
                element,
                selector.as_ref(),
                attr.as_deref(),
            )),
            (Self::Path(segments), Scope::Item(item)) => {
                Some(json::scalar_strings(&json::resolve(item, segments)))
            }
            (Self::PageUrl, _) => Some(vec![page_url.to_string()]),
            _ => None,
        }
    }
}

/// Compiles a CSS query, mapping parse failures to a config error
pub(crate) fn compile_selector(css: &str) -> ConfigResult<Selector> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

#[derive(Debug, Clone)]
struct ChainLink {
    strategy: Strategy,
    default: Option<String>,
}

/// A named field with an ordered fallback chain
///
/// Strategies are tried in order and the first one producing an accepted,
/// non-empty value wins. When all of them miss, the value falls back to the
/// first strategy default, then the field default, then `""`. A field is never
/// absent from a record.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    chain: Vec<ChainLink>,
    default: Option<String>,
    multi: bool,
    separator: String,
    absolute_url: bool,
    must_contain: Option<String>,
    drill_down: bool,
}

impl FieldSpec {
    pub fn compile(config: &FieldConfig) -> ConfigResult<Self> {
        let chain = config
            .strategies
            .iter()
            .map(|s| {
                Ok(ChainLink {
                    strategy: Strategy::compile(s)?,
                    default: s.default.clone(),
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            name: config.name.clone(),
            chain,
            default: config.default.clone(),
            multi: config.multi,
            separator: config
                .separator
                .clone()
                .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            absolute_url: config.absolute_url,
            must_contain: config.must_contain.clone().filter(|s| !s.is_empty()),
            drill_down: config.drill_down,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_drill_down(&self) -> bool {
        self.drill_down
    }

    /// Value used when every strategy misses
    pub fn fallback(&self) -> String {
        self.chain
            .iter()
            .find_map(|link| link.default.clone())
            .or_else(|| self.default.clone())
            .unwrap_or_default()
    }

    /// Value produced by the first strategy that yields one, defaults excluded
    pub(crate) fn extract(&self, scope: Scope<'_>, page_url: &str) -> Option<String> {
        for (position, link) in self.chain.iter().enumerate() {
            let Some(raw) = link.strategy.candidates(scope, page_url) else {
                continue;
            };

            if let Some(value) = self.combine(self.accept(raw, page_url)) {
                return Some(value);
            }

            trace!(field = %self.name, strategy = position, "Strategy yielded nothing");
        }

        None
    }

    /// Filters raw candidates down to usable values
    fn accept(&self, raw: Vec<String>, page_url: &str) -> Vec<String> {
        raw.into_iter()
            .filter(|v| !v.is_empty())
            .filter_map(|v| {
                if self.absolute_url {
                    resolve_against(&v, page_url)
                } else {
                    Some(v)
                }
            })
            .filter(|v| match &self.must_contain {
                Some(needle) => v.contains(needle.as_str()),
                None => true,
            })
            .collect()
    }

    fn combine(&self, values: Vec<String>) -> Option<String> {
        if values.is_empty() {
            return None;
        }

        if self.multi {
            Some(values.join(&self.separator))
        } else {
            values.into_iter().next()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;
    use serde_json::json;

    fn field(name: &str, strategies: Vec<StrategyConfig>) -> FieldConfig {
        FieldConfig {
            name: name.to_string(),
            strategies,
            default: None,
            multi: false,
            separator: None,
            absolute_url: false,
            must_contain: None,
            drill_down: false,
        }
    }

    fn css(query: &str) -> StrategyConfig {
        StrategyConfig {
            css: Some(query.to_string()),
            ..Default::default()
        }
    }

    fn css_attr(query: &str, attr: &str) -> StrategyConfig {
        StrategyConfig {
            css: Some(query.to_string()),
            attr: Some(attr.to_string()),
            ..Default::default()
        }
    }

    fn path(p: &str) -> StrategyConfig {
        StrategyConfig {
            path: Some(p.to_string()),
            ..Default::default()
        }
    }

    const PAGE: &str = "https://anime.gf/characters?page=1";

    fn evaluate(spec: &FieldSpec, scope: Scope<'_>, page_url: &str) -> String {
        spec.extract(scope, page_url)
            .unwrap_or_else(|| spec.fallback())
    }

    #[test]
    fn test_first_successful_strategy_wins() {
        let spec = FieldSpec::compile(&field(
            "name",
            vec![css("h3.char-name"), css("span.name"), css("h3")],
        ))
        .unwrap();
        let doc = Html::parse_document(r#"<div><span class="name"> Rem </span><h3>Other</h3></div>"#);

        let value = evaluate(&spec, Scope::Element(doc.root_element()), PAGE);
        assert_eq!(value, "Rem");
    }

    #[test]
    fn test_empty_match_falls_through() {
        let spec = FieldSpec::compile(&field("name", vec![css("h3"), css("span")])).unwrap();
        let doc = Html::parse_document("<h3>  </h3><span>Emilia</span>");

        assert_eq!(evaluate(&spec, Scope::Element(doc.root_element()), PAGE), "Emilia");
    }

    #[test]
    fn test_default_chain_order() {
        let mut with_strategy_default = field(
            "anime",
            vec![
                css("span.missing"),
                StrategyConfig {
                    css: Some("em.missing".to_string()),
                    default: Some("Unknown".to_string()),
                    ..Default::default()
                },
            ],
        );
        with_strategy_default.default = Some("field default".to_string());
        let spec = FieldSpec::compile(&with_strategy_default).unwrap();
        assert_eq!(spec.fallback(), "Unknown");

        let mut field_only = field("anime", vec![css("span.missing")]);
        field_only.default = Some("field default".to_string());
        assert_eq!(FieldSpec::compile(&field_only).unwrap().fallback(), "field default");

        let bare = field("anime", vec![css("span.missing")]);
        assert_eq!(FieldSpec::compile(&bare).unwrap().fallback(), "");
    }

    #[test]
    fn test_extract_excludes_defaults() {
        let mut name = field("name", vec![css("h1.title")]);
        name.default = Some("Unknown".to_string());
        let spec = FieldSpec::compile(&name).unwrap();

        let miss = Html::parse_document("<p>no title</p>");
        assert_eq!(spec.extract(Scope::Element(miss.root_element()), PAGE), None);
        assert_eq!(evaluate(&spec, Scope::Element(miss.root_element()), PAGE), "Unknown");

        let hit = Html::parse_document(r#"<h1 class="title">Beta</h1>"#);
        assert_eq!(
            spec.extract(Scope::Element(hit.root_element()), PAGE).as_deref(),
            Some("Beta")
        );
    }

    #[test]
    fn test_multi_joins_with_separator() {
        let mut tags = field("tags", vec![css("span.tag")]);
        tags.multi = true;
        let doc = Html::parse_document(
            r#"<span class="tag">tsundere</span><span class="tag"></span><span class="tag">kuudere</span>"#,
        );
        let spec = FieldSpec::compile(&tags).unwrap();
        assert_eq!(
            evaluate(&spec, Scope::Element(doc.root_element()), PAGE),
            "tsundere,kuudere"
        );

        tags.separator = Some(" | ".to_string());
        let spec = FieldSpec::compile(&tags).unwrap();
        assert_eq!(
            evaluate(&spec, Scope::Element(doc.root_element()), PAGE),
            "tsundere | kuudere"
        );
    }

    #[test]
    fn test_absolute_url_and_must_contain() {
        let mut link = field("url", vec![css_attr("a", "href")]);
        link.absolute_url = true;
        link.must_contain = Some("/character/".to_string());
        let spec = FieldSpec::compile(&link).unwrap();

        let doc = Html::parse_document(
            r#"<a href="/people/1">wrong</a><a href="javascript:void(0)">js</a><a href="/character/417/Lelouch">ok</a>"#,
        );
        assert_eq!(
            evaluate(&spec, Scope::Element(doc.root_element()), PAGE),
            "https://anime.gf/character/417/Lelouch"
        );
    }

    #[test]
    fn test_css_and_path_apply_to_their_document_kind() {
        let spec = FieldSpec::compile(&field("name", vec![css("h3"), path("name")])).unwrap();

        let item = json!({"name": "Alpha"});
        assert_eq!(evaluate(&spec, Scope::Item(&item), PAGE), "Alpha");

        let doc = Html::parse_document("<h3>Beta</h3>");
        assert_eq!(evaluate(&spec, Scope::Element(doc.root_element()), PAGE), "Beta");
    }

    #[test]
    fn test_path_multi_over_array() {
        let mut chords = field("chords", vec![path("chords.name")]);
        chords.multi = true;
        let spec = FieldSpec::compile(&chords).unwrap();

        let item = json!({"chords": [{"name": "C"}, {"name": "Am"}, {"name": "F"}]});
        assert_eq!(evaluate(&spec, Scope::Item(&item), PAGE), "C,Am,F");
    }

    #[test]
    fn test_page_url_strategy() {
        let spec = FieldSpec::compile(&field(
            "source_url",
            vec![StrategyConfig {
                page_url: true,
                ..Default::default()
            }],
        ))
        .unwrap();
        let item = json!({});
        assert_eq!(evaluate(&spec, Scope::Item(&item), PAGE), PAGE);
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let result = FieldSpec::compile(&field("bad", vec![css("div[")]));
        assert!(matches!(result, Err(ConfigError::InvalidSelector { .. })));
    }

    #[test]
    fn test_empty_strategy_rejected() {
        let result = FieldSpec::compile(&field("bad", vec![StrategyConfig::default()]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
