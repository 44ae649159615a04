use crate::config::types::{
    Config, CrawlerConfig, EntityKeyConfig, FieldConfig, JobConfig, OutputConfig, StrategyConfig,
};
use crate::extract::compile_selector;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;

    let mut dataset_names = HashSet::new();
    for dataset in &config.datasets {
        if dataset.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "dataset name cannot be empty".to_string(),
            ));
        }
        if !dataset_names.insert(dataset.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate dataset name '{}'",
                dataset.name
            )));
        }
    }

    let mut job_ids = HashSet::new();
    for job in &config.jobs {
        if !job_ids.insert(job.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate job id '{}'",
                job.id
            )));
        }
        if !dataset_names.contains(job.dataset.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Job '{}' refers to undeclared dataset '{}'",
                job.id, job.dataset
            )));
        }
        validate_job(job)?;
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.max_retries > 3 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between 0 and 3, got {}",
            config.max_retries
        )));
    }

    if config.structured_content_types.iter().any(|t| t.is_empty()) {
        return Err(ConfigError::Validation(
            "structured_content_types cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if matches!(&config.database_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "database_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates a single job declaration
fn validate_job(job: &JobConfig) -> Result<(), ConfigError> {
    if job.id.trim().is_empty() {
        return Err(ConfigError::Validation("job id cannot be empty".to_string()));
    }

    if job.seeds.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Job '{}' must have at least one seed URL",
            job.id
        )));
    }

    for seed in &job.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    if job.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "Job '{}': max_pages must be >= 1, got {}",
            job.id, job.max_pages
        )));
    }

    if job.max_records == Some(0) {
        return Err(ConfigError::Validation(format!(
            "Job '{}': max_records must be >= 1 when set",
            job.id
        )));
    }

    for pattern in &job.allowed_domains {
        validate_domain_pattern(pattern)?;
    }

    if let Some(scope) = &job.item_scope {
        validate_selector(scope)?;
    }
    for selector in &job.next_css {
        validate_selector(selector)?;
    }

    if job.fields.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Job '{}' must declare at least one field",
            job.id
        )));
    }

    let mut names = HashSet::new();
    for field in &job.fields {
        validate_field(&job.id, field)?;
        if job.constants.contains_key(&field.name) {
            return Err(ConfigError::Validation(format!(
                "Job '{}': field '{}' collides with a constant of the same name",
                job.id, field.name
            )));
        }
        if !names.insert(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Job '{}': duplicate field '{}'",
                job.id, field.name
            )));
        }
    }

    let known = |name: &str| names.contains(name) || job.constants.contains_key(name);

    for required in &job.require_fields {
        if !known(required) {
            return Err(ConfigError::Validation(format!(
                "Job '{}': required field '{}' is not declared",
                job.id, required
            )));
        }
    }

    match &job.entity_key {
        EntityKeyConfig::Field { field } | EntityKeyConfig::Segment { field, .. } => {
            if !known(field) {
                return Err(ConfigError::Validation(format!(
                    "Job '{}': entity key field '{}' is not declared",
                    job.id, field
                )));
            }
        }
        EntityKeyConfig::Hash { hash } => {
            if hash.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Job '{}': entity key hash needs at least one field",
                    job.id
                )));
            }
            if let Some(missing) = hash.iter().find(|f| !known(f)) {
                return Err(ConfigError::Validation(format!(
                    "Job '{}': entity key hash field '{}' is not declared",
                    job.id, missing
                )));
            }
        }
    }

    if let EntityKeyConfig::Segment { segment: 0, .. } = job.entity_key {
        return Err(ConfigError::Validation(format!(
            "Job '{}': entity key segment counts from 1",
            job.id
        )));
    }

    let drills_down = job.fields.iter().any(|f| f.drill_down);
    match &job.detail {
        Some(detail) => {
            if let Some(scope) = &detail.item_scope {
                validate_selector(scope)?;
            }
            let mut detail_names = HashSet::new();
            for field in &detail.fields {
                validate_field(&job.id, field)?;
                if field.drill_down {
                    return Err(ConfigError::Validation(format!(
                        "Job '{}': detail field '{}' cannot drill down further",
                        job.id, field.name
                    )));
                }
                if !detail_names.insert(field.name.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "Job '{}': duplicate detail field '{}'",
                        job.id, field.name
                    )));
                }
            }
        }
        None if drills_down => {
            return Err(ConfigError::Validation(format!(
                "Job '{}' declares a drill-down field but no [job.detail] block",
                job.id
            )));
        }
        None => {}
    }

    Ok(())
}

/// Validates a field declaration and its strategy chain
fn validate_field(job_id: &str, field: &FieldConfig) -> Result<(), ConfigError> {
    if field.name.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "Job '{}': field name cannot be empty",
            job_id
        )));
    }

    if field.strategies.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Job '{}': field '{}' needs at least one strategy",
            job_id, field.name
        )));
    }

    for strategy in &field.strategies {
        validate_strategy(job_id, &field.name, strategy)?;
    }

    Ok(())
}

/// Validates that a strategy names exactly one source
fn validate_strategy(
    job_id: &str,
    field: &str,
    strategy: &StrategyConfig,
) -> Result<(), ConfigError> {
    let sources = [
        strategy.css.is_some(),
        strategy.path.is_some(),
        strategy.page_url,
    ]
    .iter()
    .filter(|set| **set)
    .count();

    if sources != 1 {
        return Err(ConfigError::Validation(format!(
            "Job '{}': every strategy of field '{}' must set exactly one of css, path, page-url",
            job_id, field
        )));
    }

    if strategy.attr.is_some() && strategy.css.is_none() {
        return Err(ConfigError::Validation(format!(
            "Job '{}': field '{}' uses attr without a css query",
            job_id, field
        )));
    }

    if let Some(css) = &strategy.css {
        if !css.trim().is_empty() {
            validate_selector(css)?;
        }
    }

    Ok(())
}

/// Validates that a CSS query compiles
fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    compile_selector(selector).map(|_| ())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);

    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains("..")
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' is malformed",
            domain
        )));
    }

    Ok(())
}
