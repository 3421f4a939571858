//! String helpers shared by the config layer and the wire-protocol parsers.

/// Clean an optional string field: trim whitespace and drop empty values.
///
/// # Example
/// ```ignore
/// let registrar = clean_optional_string(fields.get("Registrar"));
/// ```
#[inline]
pub fn clean_optional_string(s: Option<&String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// String cleanup extension trait
pub trait StringExt {
    /// Trim and return `None` for empty strings
    fn clean(&self) -> Option<String>;

    /// Trim into an owned string
    fn trimmed(&self) -> String;
}

impl StringExt for str {
    #[inline]
    fn clean(&self) -> Option<String> {
        let trimmed = self.trim();
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    }

    #[inline]
    fn trimmed(&self) -> String {
        self.trim().to_string()
    }
}

impl StringExt for String {
    #[inline]
    fn clean(&self) -> Option<String> {
        self.as_str().clean()
    }

    #[inline]
    fn trimmed(&self) -> String {
        self.as_str().trimmed()
    }
}

impl<T: AsRef<str>> StringExt for Option<T> {
    #[inline]
    fn clean(&self) -> Option<String> {
        self.as_ref().and_then(|s| s.as_ref().clean())
    }

    #[inline]
    fn trimmed(&self) -> String {
        self.as_ref().map(|s| s.as_ref().trim().to_string()).unwrap_or_default()
    }
}
