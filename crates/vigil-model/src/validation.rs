//! Model-level validation entry points, called by the persistence layer
//! before a record is accepted.
//!
//! All checks here are pure functions over their inputs; none of them
//! consults storage. Error messages carry the attribute and the 1-indexed
//! line of the offending tag so administrative callers can surface them
//! verbatim.

use ipnet::IpNet;

use crate::{ModelError, ModelResult};

const TAG_PREFIX: &str = "@auth:";
const REALM_KEY: &str = "@auth:realm";
const NAMESPACE_KEY: &str = "@auth:namespace";
const MAX_TAG_BYTES: usize = 1024;

/// Validate an authorization subject expression.
///
/// The expression is a disjunction of lines, each line a conjunction of
/// tags. An empty expression (or one composed only of empty lines) is valid
/// and means "no subject restriction configured yet".
pub fn validate_subject(attribute: &str, expression: &[Vec<String>]) -> ModelResult<()> {
    for (index, line) in expression.iter().enumerate() {
        if line.is_empty() {
            continue;
        }

        let line_number = index + 1;
        let mut realms = 0;
        let mut has_namespace_key = false;
        let mut realm_value = String::new();

        for tag in line {
            if tag.len() >= MAX_TAG_BYTES {
                return Err(ModelError::validation(
                    attribute,
                    format!(
                        "Subject claims '{tag}' on line {line_number} must be less than 1024 bytes"
                    ),
                ));
            }
            if !tag.starts_with(TAG_PREFIX) {
                return Err(ModelError::validation(
                    attribute,
                    format!(
                        "Subject claims '{tag}' on line {line_number} must be prefixed by '@auth:'"
                    ),
                ));
            }

            let Some((key, value)) = tag.split_once('=') else {
                return Err(ModelError::validation(
                    attribute,
                    format!("Subject claims '{tag}' on line {line_number} is an invalid tag"),
                ));
            };
            if key.len() <= TAG_PREFIX.len() || value.contains('=') {
                return Err(ModelError::validation(
                    attribute,
                    format!("Subject claims '{tag}' on line {line_number} is an invalid tag"),
                ));
            }
            if value.is_empty() {
                return Err(ModelError::validation(
                    attribute,
                    format!("Subject claims '{tag}' on line {line_number} has no value"),
                ));
            }

            if key == REALM_KEY {
                realms += 1;
                realm_value = value.to_ascii_lowercase();
            }
            if key == NAMESPACE_KEY {
                has_namespace_key = true;
            }
        }

        if realms == 0 {
            return Err(ModelError::validation(
                attribute,
                format!("Subject line {line_number} must contain the '@auth:realm' key"),
            ));
        }
        if realms > 1 {
            return Err(ModelError::validation(
                attribute,
                format!("Subject line {line_number} must contain only one '@auth:realm' key"),
            ));
        }
        if line.len() < 2 {
            return Err(ModelError::validation(
                attribute,
                format!("Subject line {line_number} should contain at least 2 claims"),
            ));
        }
        if matches!(realm_value.as_str(), "oidc" | "saml") && !has_namespace_key {
            return Err(ModelError::validation(
                attribute,
                format!(
                    "Subject line {line_number} mandates to add the '@auth:namespace' key \
                     to prevent potential security side effects"
                ),
            ));
        }
    }

    Ok(())
}

/// Validate a single CIDR string.
pub fn validate_cidr(attribute: &str, network: &str) -> ModelResult<()> {
    if network.parse::<IpNet>().is_ok() {
        return Ok(());
    }

    Err(ModelError::validation(
        attribute,
        format!("Attribute '{attribute}' must be a CIDR"),
    ))
}

/// Validate a list of CIDR strings. The list may be empty.
pub fn validate_cidr_list_optional(attribute: &str, networks: &[String]) -> ModelResult<()> {
    for network in networks {
        validate_cidr(attribute, network)?;
    }
    Ok(())
}

/// Validate a bare namespace segment as supplied at creation time.
pub fn validate_namespace_segment(attribute: &str, name: &str) -> ModelResult<()> {
    if name.is_empty() {
        return Err(ModelError::validation(
            attribute,
            format!("Attribute '{attribute}' must not be empty"),
        ));
    }
    if name.contains('/') {
        return Err(ModelError::validation(
            attribute,
            "Name must not contain any '/' during creation",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ModelError::validation(
            attribute,
            format!("Attribute '{attribute}' must only contain alphanumeric characters or '_'"),
        ));
    }
    Ok(())
}

/// Validate a full namespace path.
pub fn validate_namespace_path(attribute: &str, path: &str) -> ModelResult<()> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') {
        return Err(ModelError::validation(
            attribute,
            format!("Attribute '{attribute}' must be an absolute namespace path"),
        ));
    }
    for segment in path[1..].split('/') {
        validate_namespace_segment(attribute, segment)?;
    }
    Ok(())
}
