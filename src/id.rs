//! Composite resource identifiers.
//!
//! A resource's `id` joins its path-segment identifiers with [`SEPARATOR`].
//! No escaping is done; identifier attributes carry the
//! [`NoSeparator`](crate::schema::AttributeValidator::NoSeparator) validator
//! instead.

use crate::error::ProviderError;

/// The reserved separator between id parts.
pub const SEPARATOR: char = ',';

/// Join id parts in order.
pub fn encode<S: AsRef<str>>(parts: &[S]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        out.push_str(part.as_ref());
    }
    out
}

/// Split an id into exactly `expected` non-empty parts.
pub fn decode(id: &str, expected: usize) -> Result<Vec<String>, ProviderError> {
    let parts: Vec<String> = id.split(SEPARATOR).map(str::to_string).collect();
    if parts.len() != expected {
        return Err(ProviderError::InvalidRequest(format!(
            "expected {} id parts, got {} in {:?}",
            expected,
            parts.len(),
            id
        )));
    }
    if let Some(pos) = parts.iter().position(String::is_empty) {
        return Err(ProviderError::InvalidRequest(format!(
            "id part {} is empty in {:?}",
            pos + 1,
            id
        )));
    }
    Ok(parts)
}

/// Whether a value can be used as an id part.
pub fn is_separator_free(value: &str) -> bool {
    !value.contains(SEPARATOR)
}

/// The fixed import format of one resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportFormat {
    fields: &'static [&'static str],
}

impl ImportFormat {
    /// Create an import format from the ordered path-segment attribute names.
    pub const fn new(fields: &'static [&'static str]) -> Self {
        Self { fields }
    }

    /// The attribute names, in id order.
    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    /// Render the expected format, e.g. `[project_id],[region],[instance_id]`.
    pub fn describe(&self) -> String {
        let bracketed: Vec<String> = self.fields.iter().map(|f| format!("[{}]", f)).collect();
        encode(&bracketed)
    }

    /// Parse an operator-supplied import id into `(attribute, value)` pairs.
    pub fn parse(&self, id: &str) -> Result<Vec<(&'static str, String)>, ProviderError> {
        let parts = decode(id, self.fields.len()).map_err(|_| {
            ProviderError::InvalidRequest(format!(
                "Expected import identifier with format: {}  Got: {:?}",
                self.describe(),
                id
            ))
        })?;
        Ok(self.fields.iter().copied().zip(parts).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTE: ImportFormat = ImportFormat::new(&[
        "organization_id",
        "region",
        "network_area_id",
        "routing_table_id",
        "route_id",
    ]);

    #[test]
    fn test_encode_preserves_order() {
        assert_eq!(encode(&["pid", "eu01", "iid"]), "pid,eu01,iid");
        assert_eq!(encode(&["single"]), "single");
        assert_eq!(encode::<&str>(&[]), "");
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode("pid,eu01,iid", 3).unwrap(), vec!["pid", "eu01", "iid"]);
        assert!(decode("pid,eu01", 3).is_err());
        assert!(decode("pid,eu01,iid,extra", 3).is_err());
        assert!(decode("pid,,iid", 3).is_err());
        assert!(decode("", 1).is_err());
    }

    #[test]
    fn test_import_format() {
        assert_eq!(
            ROUTE.describe(),
            "[organization_id],[region],[network_area_id],[routing_table_id],[route_id]"
        );

        let parsed = ROUTE.parse("org,eu01,area,table,route").unwrap();
        assert_eq!(parsed[0], ("organization_id", "org".to_string()));
        assert_eq!(parsed[4], ("route_id", "route".to_string()));

        let err = ROUTE.parse("org,eu01,area,table").unwrap_err();
        assert!(err.to_string().contains("Expected import identifier with format"));
        assert!(err.to_string().contains("[route_id]"));
    }

    #[test]
    fn test_separator_free() {
        assert!(is_separator_free("abc"));
        assert!(!is_separator_free("a,b"));
    }
}
