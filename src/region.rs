//! Effective region resolution.

use crate::value::Attr;

/// The region of an operation: the resource's own `region` when set,
/// otherwise the provider default at the time of the call.
pub fn effective_region(explicit: &Attr<String>, provider_default: &str) -> String {
    match explicit.as_str() {
        Some(region) if !region.is_empty() => region.to_string(),
        _ => provider_default.to_string(),
    }
}

/// The planned region of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPlan {
    /// The region the resource will live in after apply. Unknown while the
    /// configured value is not yet known.
    pub region: Attr<String>,
    /// Whether reaching that region needs destroy-and-recreate.
    pub requires_replace: bool,
}

/// Plan the region of a resource.
///
/// `configured` is the attribute as written in configuration and `prior` the
/// region persisted in state (absent on create). Regions are immutable after
/// creation, so any difference from `prior` forces replacement. This also
/// covers the provider default changing underneath an unset attribute.
///
/// An unknown configured region plans unknown; on update it may differ from
/// `prior`, so it forces replacement.
///
/// # Arguments
///
/// * `configured` - The `region` attribute from configuration
/// * `prior` - The region in prior state, `None` on create
/// * `provider_default` - The provider-level default region
///
/// # Example
///
/// ```
/// use stackit_provider::region::plan_region;
/// use stackit_provider::value::Attr;
///
/// let plan = plan_region(&Attr::Null, Some("eu01"), "eu01");
/// assert_eq!(plan.region, Attr::known("eu01"));
/// assert!(!plan.requires_replace);
///
/// let plan = plan_region(&Attr::Unknown, Some("eu01"), "eu01");
/// assert!(plan.region.is_unknown());
/// assert!(plan.requires_replace);
/// ```
pub fn plan_region(configured: &Attr<String>, prior: Option<&str>, provider_default: &str) -> RegionPlan {
    if configured.is_unknown() {
        return RegionPlan {
            region: Attr::Unknown,
            requires_replace: prior.is_some(),
        };
    }
    let region = effective_region(configured, provider_default);
    let requires_replace = match prior {
        Some(prior) => prior != region,
        None => false,
    };
    RegionPlan {
        region: Attr::Known(region),
        requires_replace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        assert_eq!(effective_region(&Attr::known("eu02"), "eu01"), "eu02");
        assert_eq!(effective_region(&Attr::Null, "eu01"), "eu01");
        assert_eq!(effective_region(&Attr::Unknown, "eu01"), "eu01");
        assert_eq!(effective_region(&Attr::known(""), "eu01"), "eu01");
    }

    #[test]
    fn test_plan_create() {
        let plan = plan_region(&Attr::Null, None, "eu01");
        assert_eq!(plan.region, Attr::known("eu01"));
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_plan_unknown_region() {
        let plan = plan_region(&Attr::Unknown, None, "eu01");
        assert_eq!(plan.region, Attr::Unknown);
        assert!(!plan.requires_replace);

        let plan = plan_region(&Attr::Unknown, Some("eu01"), "eu01");
        assert_eq!(plan.region, Attr::Unknown);
        assert!(plan.requires_replace);
    }

    #[test]
    fn test_plan_change_forces_replacement() {
        let plan = plan_region(&Attr::known("eu02"), Some("eu01"), "eu01");
        assert_eq!(plan.region, Attr::known("eu02"));
        assert!(plan.requires_replace);

        // unset attribute follows a changed provider default
        let plan = plan_region(&Attr::Null, Some("eu01"), "eu02");
        assert!(plan.requires_replace);

        let plan = plan_region(&Attr::Null, Some("eu01"), "eu01");
        assert!(!plan.requires_replace);
    }
}
