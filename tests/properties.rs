//! Property tests for the shared attribute helpers.

use proptest::prelude::*;

use stackit_provider::id;
use stackit_provider::patch::{self, Labels};
use stackit_provider::region::{effective_region, plan_region};
use stackit_provider::union::{self, Destination, NextHop, TaggedUnion};
use stackit_provider::Attr;

fn id_part() -> impl Strategy<Value = String> {
    "[a-z0-9-]{1,16}"
}

fn destination() -> impl Strategy<Value = Destination> {
    prop_oneof![
        "[0-9./]{1,18}".prop_map(Destination::CidrV4),
        "[0-9a-f:/]{1,24}".prop_map(Destination::CidrV6),
    ]
}

fn next_hop() -> impl Strategy<Value = NextHop> {
    prop_oneof![
        Just(NextHop::Blackhole),
        Just(NextHop::Internet),
        "[0-9.]{1,15}".prop_map(NextHop::Ipv4),
        "[0-9a-f:]{1,24}".prop_map(NextHop::Ipv6),
    ]
}

fn labels() -> impl Strategy<Value = Labels> {
    prop::collection::btree_map("[a-e]{1,2}", "[a-z]{0,3}", 0..6)
}

fn round_trip<U: TaggedUnion + PartialEq + std::fmt::Debug>(original: U) -> Result<(), TestCaseError> {
    let wire = union::to_wire(&original);
    let decoded: Option<U> = union::from_wire(Some(&wire)).map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(decoded.as_ref(), Some(&original));

    let model = union::to_model(Some(&original));
    let decoded: Option<U> = union::from_model(&model).map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(decoded.as_ref(), Some(&original));
    Ok(())
}

proptest! {
    #[test]
    fn destination_round_trips(dest in destination()) {
        round_trip(dest)?;
    }

    #[test]
    fn next_hop_round_trips(hop in next_hop()) {
        round_trip(hop)?;
    }

    #[test]
    fn id_round_trips(parts in prop::collection::vec(id_part(), 1..6)) {
        let encoded = id::encode(&parts);
        prop_assert_eq!(id::decode(&encoded, parts.len()).unwrap(), parts.clone());
        prop_assert!(id::decode(&encoded, parts.len() + 1).is_err());
    }

    #[test]
    fn patch_reaches_desired(previous in labels(), desired in labels()) {
        let patch = patch::diff(&previous, &desired);
        prop_assert_eq!(patch.apply(&previous), desired.clone());

        for (key, value) in patch.iter() {
            match value {
                Some(v) => prop_assert_ne!(previous.get(key), Some(v)),
                None => prop_assert!(previous.contains_key(key) && !desired.contains_key(key)),
            }
        }
    }

    #[test]
    fn patch_of_unchanged_map_is_empty(map in labels()) {
        prop_assert!(patch::diff(&map, &map).is_empty());
        let update = patch::compute_update(&Attr::Known(map.clone()), &Attr::Known(map));
        prop_assert!(update.map_or(true, |p| p.is_empty()));
    }

    #[test]
    fn null_labels_delete_every_key(previous in labels()) {
        match patch::compute_update(&Attr::Known(previous.clone()), &Attr::Null) {
            None => prop_assert!(previous.is_empty()),
            Some(patch) => {
                prop_assert_eq!(patch.len(), previous.len());
                prop_assert!(patch.apply(&previous).is_empty());
            },
        }
    }

    #[test]
    fn explicit_region_wins(explicit in "[a-z]{2}[0-9]{2}", default in "[a-z]{2}[0-9]{2}") {
        prop_assert_eq!(effective_region(&Attr::known(explicit.as_str()), &default), explicit);
        prop_assert_eq!(effective_region(&Attr::Null, &default), default.clone());
        prop_assert_eq!(effective_region(&Attr::Unknown, &default), default);
    }

    #[test]
    fn region_change_replaces(
        configured in prop::option::of("[a-z]{2}0[1-3]"),
        prior in "[a-z]{2}0[1-3]",
        default in "[a-z]{2}0[1-3]",
    ) {
        let attr = configured.clone().map_or(Attr::Null, Attr::Known);
        let plan = plan_region(&attr, Some(&prior), &default);
        let expected = configured.unwrap_or(default);
        prop_assert_eq!(plan.requires_replace, prior != expected);
        prop_assert_eq!(plan.region, Attr::Known(expected));
    }
}
