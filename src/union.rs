//! Tagged union attributes.
//!
//! Some API objects are one of a closed set of variants, told apart by a
//! `type` discriminator (a route destination is either a CIDRv4 or a CIDRv6
//! block). In configuration they are a flat `{type, value}` object
//! ([`TypedValue`]); on the wire they are a [`TaggedObject`]. Both sides go
//! through a closed Rust enum implementing [`TaggedUnion`], so unrecognized
//! discriminators are rejected at the boundary.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::value::Attr;

/// The wire shape of a tagged union: a discriminator plus an optional scalar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedObject {
    /// Variant discriminator.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Variant payload, absent for valueless variants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// The configuration shape of a tagged union.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypedValue {
    /// Variant discriminator.
    #[serde(rename = "type")]
    pub kind: Attr<String>,
    /// Variant payload, null for valueless variants.
    pub value: Attr<String>,
}

impl TypedValue {
    /// Build a known `{type, value}` object.
    pub fn new(kind: &str, value: Option<&str>) -> Self {
        Self {
            kind: Attr::Known(kind.to_string()),
            value: Attr::from_wire(value.map(str::to_string)),
        }
    }
}

/// A closed set of variants keyed by a discriminator string.
pub trait TaggedUnion: Sized {
    /// Attribute name used in error messages.
    const ATTRIBUTE: &'static str;

    /// The discriminator of this variant.
    fn kind(&self) -> &'static str;

    /// The scalar payload, if the variant carries one.
    fn value(&self) -> Option<&str>;

    /// Build a variant from its discriminator and payload.
    fn from_parts(kind: &str, value: Option<&str>) -> Result<Self, ProviderError>;
}

/// Decode a wire union. An absent union is `None`; a present one without a
/// discriminator is a mapping error.
pub fn from_wire<U: TaggedUnion>(wire: Option<&TaggedObject>) -> Result<Option<U>, ProviderError> {
    let Some(wire) = wire else {
        return Ok(None);
    };
    let kind = wire.kind.as_deref().ok_or_else(|| {
        ProviderError::mapping(format!("received empty {} from the API", U::ATTRIBUTE))
    })?;
    U::from_parts(kind, wire.value.as_deref()).map(Some)
}

/// Encode a union for an API payload.
pub fn to_wire<U: TaggedUnion>(union: &U) -> TaggedObject {
    TaggedObject {
        kind: Some(union.kind().to_string()),
        value: union.value().map(str::to_string),
    }
}

/// Convert a union into its configuration object.
pub fn to_model<U: TaggedUnion>(union: Option<&U>) -> Attr<TypedValue> {
    match union {
        Some(u) => Attr::Known(TypedValue::new(u.kind(), u.value())),
        None => Attr::Null,
    }
}

/// Convert a configuration object into a union.
///
/// A null or unknown object yields `None`. A known object must have a known
/// discriminator that names one of the variants.
pub fn from_model<U: TaggedUnion>(model: &Attr<TypedValue>) -> Result<Option<U>, ProviderError> {
    let Some(model) = model.as_known() else {
        return Ok(None);
    };
    let kind = model.kind.as_str().ok_or_else(|| {
        ProviderError::mapping(format!("{}.type must be set", U::ATTRIBUTE))
    })?;
    if model.value.is_unknown() {
        return Err(ProviderError::mapping(format!(
            "{}.value must be known before apply",
            U::ATTRIBUTE
        )));
    }
    U::from_parts(kind, model.value.as_str()).map(Some)
}

/// Take the only element of a list the API returns for a single-item create.
pub fn single_item<T>(items: Option<Vec<T>>, what: &str) -> Result<T, ProviderError> {
    let mut items = items.unwrap_or_default();
    match items.len() {
        0 => Err(ProviderError::mapping(format!(
            "API returned no {} in the response",
            what
        ))),
        1 => Ok(items.remove(0)),
        n => Err(ProviderError::mapping(format!(
            "API returned {} {} items, expected exactly one",
            n, what
        ))),
    }
}

/// Require a payload for value-carrying variants.
fn required_value(attribute: &str, kind: &str, value: Option<&str>) -> Result<String, ProviderError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ProviderError::mapping(format!(
            "{} of type {:?} requires a value",
            attribute, kind
        ))),
    }
}

fn forbid_value(attribute: &str, kind: &str, value: Option<&str>) -> Result<(), ProviderError> {
    match value {
        None => Ok(()),
        Some(_) => Err(ProviderError::mapping(format!(
            "{} of type {:?} does not take a value",
            attribute, kind
        ))),
    }
}

/// Where traffic of a route is headed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// An IPv4 CIDR block.
    CidrV4(String),
    /// An IPv6 CIDR block.
    CidrV6(String),
}

impl TaggedUnion for Destination {
    const ATTRIBUTE: &'static str = "destination";

    fn kind(&self) -> &'static str {
        match self {
            Self::CidrV4(_) => "cidrv4",
            Self::CidrV6(_) => "cidrv6",
        }
    }

    fn value(&self) -> Option<&str> {
        match self {
            Self::CidrV4(v) | Self::CidrV6(v) => Some(v),
        }
    }

    fn from_parts(kind: &str, value: Option<&str>) -> Result<Self, ProviderError> {
        match kind {
            "cidrv4" => required_value(Self::ATTRIBUTE, kind, value).map(Self::CidrV4),
            "cidrv6" => required_value(Self::ATTRIBUTE, kind, value).map(Self::CidrV6),
            other => Err(ProviderError::mapping(format!(
                "unknown destination type {:?}, expected one of \"cidrv4\", \"cidrv6\"",
                other
            ))),
        }
    }
}

/// Where a route sends matching traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextHop {
    /// Drop the traffic.
    Blackhole,
    /// Send it to the internet gateway.
    Internet,
    /// Forward to an IPv4 address.
    Ipv4(String),
    /// Forward to an IPv6 address.
    Ipv6(String),
}

impl TaggedUnion for NextHop {
    const ATTRIBUTE: &'static str = "next_hop";

    fn kind(&self) -> &'static str {
        match self {
            Self::Blackhole => "blackhole",
            Self::Internet => "internet",
            Self::Ipv4(_) => "ipv4",
            Self::Ipv6(_) => "ipv6",
        }
    }

    fn value(&self) -> Option<&str> {
        match self {
            Self::Blackhole | Self::Internet => None,
            Self::Ipv4(v) | Self::Ipv6(v) => Some(v),
        }
    }

    fn from_parts(kind: &str, value: Option<&str>) -> Result<Self, ProviderError> {
        match kind {
            "blackhole" => forbid_value(Self::ATTRIBUTE, kind, value).map(|_| Self::Blackhole),
            "internet" => forbid_value(Self::ATTRIBUTE, kind, value).map(|_| Self::Internet),
            "ipv4" => required_value(Self::ATTRIBUTE, kind, value).map(Self::Ipv4),
            "ipv6" => required_value(Self::ATTRIBUTE, kind, value).map(Self::Ipv6),
            other => Err(ProviderError::mapping(format!(
                "unknown next_hop type {:?}, expected one of \"blackhole\", \"internet\", \"ipv4\", \"ipv6\"",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(kind: Option<&str>, value: Option<&str>) -> TaggedObject {
        TaggedObject {
            kind: kind.map(str::to_string),
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn test_absent_union_is_null() {
        let decoded: Option<NextHop> = from_wire(None).unwrap();
        assert!(decoded.is_none());
        assert_eq!(to_model::<NextHop>(None), Attr::Null);
    }

    #[test]
    fn test_empty_union_is_an_error() {
        let err = from_wire::<NextHop>(Some(&TaggedObject::default())).unwrap_err();
        assert!(matches!(err, ProviderError::Mapping(_)));
        assert!(err.to_string().contains("empty next_hop"));
    }

    #[test]
    fn test_next_hop_variants() {
        let hop: NextHop = from_wire(Some(&wire(Some("internet"), None))).unwrap().unwrap();
        assert_eq!(hop, NextHop::Internet);
        assert_eq!(
            to_model(Some(&hop)),
            Attr::Known(TypedValue::new("internet", None))
        );

        let hop: NextHop = from_wire(Some(&wire(Some("ipv4"), Some("10.1.1.1"))))
            .unwrap()
            .unwrap();
        assert_eq!(hop, NextHop::Ipv4("10.1.1.1".to_string()));

        assert!(from_wire::<NextHop>(Some(&wire(Some("ipv6"), None))).is_err());
        assert!(from_wire::<NextHop>(Some(&wire(Some("blackhole"), Some("x")))).is_err());
    }

    #[test]
    fn test_unknown_discriminator() {
        let model = Attr::Known(TypedValue::new("gateway", Some("1.2.3.4")));
        let err = from_model::<NextHop>(&model).unwrap_err();
        assert!(err.to_string().contains("unknown next_hop type"));

        let err = from_wire::<Destination>(Some(&wire(Some("cidrv5"), Some("x")))).unwrap_err();
        assert!(err.to_string().contains("unknown destination type"));
    }

    #[test]
    fn test_from_model() {
        let model = Attr::Known(TypedValue::new("cidrv4", Some("10.0.0.0/24")));
        let dest: Destination = from_model(&model).unwrap().unwrap();
        assert_eq!(to_wire(&dest), wire(Some("cidrv4"), Some("10.0.0.0/24")));

        assert!(from_model::<Destination>(&Attr::Null).unwrap().is_none());

        let missing_kind = Attr::Known(TypedValue {
            kind: Attr::Null,
            value: Attr::known("10.0.0.0/24"),
        });
        assert!(from_model::<Destination>(&missing_kind).is_err());
    }

    #[test]
    fn test_single_item() {
        assert_eq!(single_item(Some(vec![1]), "route").unwrap(), 1);

        let err = single_item::<i32>(Some(vec![]), "route").unwrap_err();
        assert!(err.to_string().contains("no route"));
        assert!(single_item::<i32>(None, "route").is_err());

        let err = single_item(Some(vec![1, 2]), "route").unwrap_err();
        assert!(err.to_string().contains("expected exactly one"));
    }
}
