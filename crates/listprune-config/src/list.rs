//! Per-list settings
//!
//! Each managed document carries its own configuration template, e.g.
//! `{{User list pruning|inactivity=1 year|indeffed=2 months|format=plain}}`.
//! `inactivity` and `format` are required; `indeffed` defaults to the
//! conventional two calendar months, and `indeffed=0` means "immediately".

use std::collections::HashMap;

use regex::Regex;
use time::OffsetDateTime;

use crate::{duration, ConfigError};

/// Settings for one managed list, with the cutoffs already computed.
#[derive(Debug, Clone)]
pub struct ListConfig {
    pub inactivity_cutoff: OffsetDateTime,
    pub block_cutoff: OffsetDateTime,
    /// Name of the extraction pattern in the formats map.
    pub format: String,
    /// All template parameters, for the message plumbing downstream.
    pub parameters: HashMap<String, String>,
}

/// Compile the matcher for a configuration template by name. The single
/// capture group holds the parameter blob.
pub fn template_regex(template_name: &str) -> Result<Regex, ConfigError> {
    let pattern = format!(
        r"\{{\{{{}\s*?((?:\|.*\s*?)*)\}}\}}",
        regex::escape(template_name)
    );
    Ok(Regex::new(&pattern)?)
}

impl ListConfig {
    /// Parse the first configuration template found in `document`.
    pub fn parse(
        document: &str,
        template: &Regex,
        now: OffsetDateTime,
    ) -> Result<Self, ConfigError> {
        let caps = template
            .captures(document)
            .ok_or(ConfigError::MissingTemplate)?;
        let blob = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

        let mut parameters = HashMap::new();
        // the blob starts with a pipe by construction
        for piece in blob.strip_prefix('|').unwrap_or(blob).split('|') {
            if let Some((key, value)) = piece.split_once('=') {
                parameters.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        for required in ["inactivity", "format"] {
            if !parameters.contains_key(required) {
                return Err(ConfigError::MissingParameter(required.to_string()));
            }
        }

        let inactivity_span = duration::parse(&parameters["inactivity"])?;
        let inactivity_cutoff = duration::ago(now, inactivity_span);

        let block_cutoff = match parameters.get("indeffed").map(String::as_str) {
            // immediately; zero is not a parseable span
            Some("0") => now,
            Some(value) => match duration::parse(value) {
                Ok(span) => duration::ago(now, span),
                // invalid value falls back to the default window
                Err(_) => duration::months_ago(now, 2),
            },
            None => duration::months_ago(now, 2),
        };

        let format = parameters["format"].clone();

        Ok(Self {
            inactivity_cutoff,
            block_cutoff,
            format,
            parameters,
        })
    }
}
