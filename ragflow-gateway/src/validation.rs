//! Input hardening applied to every request before it reaches a handler
//! (§4.1 step 1). Plain substring/pattern checks rather than a regex engine —
//! the patterns called out are fixed literal sequences, not a grammar.

const SQL_META: &[&str] = &["' or ", "' OR ", ";--", " union select ", " UNION SELECT "];
const SHELL_META: &[char] = &[';', '|', '`', '$'];
const HTML_TOKENS: &[&str] = &["<script", "<iframe", "onerror=", "onload=", "javascript:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationViolation {
    SqlMetaSequence,
    ShellMetaCharacter,
    DirectoryTraversal,
    HtmlInjectionToken,
    RequestTooLarge { size: usize, max: usize },
    DisallowedHeader { name: String },
}

impl ValidationViolation {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationViolation::SqlMetaSequence => "sql_meta_sequence",
            ValidationViolation::ShellMetaCharacter => "shell_meta_character",
            ValidationViolation::DirectoryTraversal => "directory_traversal",
            ValidationViolation::HtmlInjectionToken => "html_injection_token",
            ValidationViolation::RequestTooLarge { .. } => "request_too_large",
            ValidationViolation::DisallowedHeader { .. } => "disallowed_header",
        }
    }
}

/// Checks a single free-text value (query param value, JSON string field) for
/// SQL meta-sequences and HTML injection tokens. Path segments additionally
/// go through [`check_path_segment`] for shell meta-characters and traversal.
pub fn check_text_field(value: &str) -> Result<(), ValidationViolation> {
    let lower = value.to_lowercase();
    if SQL_META.iter().any(|pattern| lower.contains(&pattern.to_lowercase())) {
        return Err(ValidationViolation::SqlMetaSequence);
    }
    if HTML_TOKENS.iter().any(|token| lower.contains(token)) {
        return Err(ValidationViolation::HtmlInjectionToken);
    }
    Ok(())
}

/// Checks one path segment for shell meta-characters, `$(`, and `..`
/// traversal.
pub fn check_path_segment(segment: &str) -> Result<(), ValidationViolation> {
    if segment.contains("..") {
        return Err(ValidationViolation::DirectoryTraversal);
    }
    if segment.contains("$(") || segment.chars().any(|c| SHELL_META.contains(&c)) {
        return Err(ValidationViolation::ShellMetaCharacter);
    }
    Ok(())
}

pub fn check_request_size(size: usize, max: usize) -> Result<(), ValidationViolation> {
    if size > max {
        return Err(ValidationViolation::RequestTooLarge { size, max });
    }
    Ok(())
}

/// Header names must be lowercase ASCII letters, digits, and hyphens; header
/// values must not contain control characters (CR/LF injection).
pub fn check_header(name: &str, value: &str) -> Result<(), ValidationViolation> {
    let name_ok = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    let value_ok = !value.chars().any(|c| c.is_control());
    if !name_ok || !value_ok {
        return Err(ValidationViolation::DisallowedHeader { name: name.to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_sql_meta_sequence() {
        assert_eq!(check_text_field("admin' OR 1=1;--").unwrap_err(), ValidationViolation::SqlMetaSequence);
    }

    #[test]
    fn rejects_html_injection_token() {
        assert_eq!(check_text_field("<script>alert(1)</script>").unwrap_err(), ValidationViolation::HtmlInjectionToken);
    }

    #[test]
    fn accepts_ordinary_text() {
        assert!(check_text_field("what is rust ownership?").is_ok());
    }

    #[test]
    fn rejects_directory_traversal() {
        assert_eq!(check_path_segment("../../etc/passwd").unwrap_err(), ValidationViolation::DirectoryTraversal);
    }

    #[test]
    fn rejects_shell_metacharacters() {
        assert_eq!(check_path_segment("file;rm -rf").unwrap_err(), ValidationViolation::ShellMetaCharacter);
        assert_eq!(check_path_segment("$(whoami)").unwrap_err(), ValidationViolation::ShellMetaCharacter);
    }

    #[test]
    fn enforces_size_cap() {
        assert!(check_request_size(100, 1024).is_ok());
        assert!(check_request_size(2048, 1024).is_err());
    }

    #[test]
    fn rejects_header_with_control_character() {
        assert!(check_header("x-tenant-id", "abc\r\nX-Injected: yes").is_err());
    }

    #[test]
    fn rejects_header_name_with_uppercase_or_symbols() {
        assert!(check_header("X_Tenant Id", "abc").is_err());
        assert!(check_header("x-tenant-id", "abc").is_ok());
    }
}
