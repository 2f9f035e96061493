use crate::error::{Error, Result};

const MIN_SUBDOMAIN_LEN: usize = 3;
const MAX_SUBDOMAIN_LEN: usize = 20;
const MAX_SITE_NAME_LEN: usize = 100;
const MAX_DOMAIN_LEN: usize = 253;

/// Lowercases and validates a subdomain. The accepted shape is
/// `[a-z0-9][a-z0-9-]{1,18}[a-z0-9]`: 3-20 chars, alphanumeric ends,
/// hyphens allowed in between.
pub fn normalize_subdomain(subdomain: &str) -> Result<String> {
    let subdomain = subdomain.trim().to_ascii_lowercase();

    if subdomain.len() < MIN_SUBDOMAIN_LEN || subdomain.len() > MAX_SUBDOMAIN_LEN {
        return Err(Error::Validation(format!(
            "Subdomain must be {MIN_SUBDOMAIN_LEN}-{MAX_SUBDOMAIN_LEN} characters"
        )));
    }

    let bytes = subdomain.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return Err(Error::Validation(
            "Subdomain must start and end with a letter or digit".to_string(),
        ));
    }
    if !bytes.iter().all(|&b| edge_ok(b) || b == b'-') {
        return Err(Error::Validation(
            "Subdomain can only contain lowercase letters, digits, and hyphens".to_string(),
        ));
    }

    Ok(subdomain)
}

pub fn validate_site_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Site name cannot be empty".to_string()));
    }
    if name.len() > MAX_SITE_NAME_LEN {
        return Err(Error::Validation(format!(
            "Site name cannot exceed {MAX_SITE_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Lowercases and validates a custom domain: dot-separated labels of
/// letters, digits, and interior hyphens.
pub fn normalize_domain(domain: &str) -> Result<String> {
    let domain = domain.trim().to_ascii_lowercase();

    if domain.len() < MIN_SUBDOMAIN_LEN || domain.len() > MAX_DOMAIN_LEN {
        return Err(Error::Validation("Invalid domain length".to_string()));
    }
    if !domain.contains('.') {
        return Err(Error::Validation(
            "Domain must be fully qualified".to_string(),
        ));
    }

    for label in domain.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(Error::Validation("Invalid domain label".to_string()));
        }
        let bytes = label.as_bytes();
        let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
        if !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
            return Err(Error::Validation("Invalid domain label".to_string()));
        }
        if !bytes.iter().all(|&b| alnum(b) || b == b'-') {
            return Err(Error::Validation("Invalid domain label".to_string()));
        }
    }

    Ok(domain)
}
