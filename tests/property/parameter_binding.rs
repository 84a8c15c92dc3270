// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Parameter Binding
//!
//! Binding is pure, so these properties cover precedence and failure
//! without any remote service.

use std::collections::{BTreeMap, BTreeSet};

use cim_formation::dependency::lookup_path;
use cim_formation::domain::{KmsKey, ParameterValue, Project, Target};
use cim_formation::stack::{plan_bindings, Binding, WellKnownValues};
use cim_formation::FormationError;
use proptest::prelude::*;
use serde_json::{Map, Value};

const RESERVED: [&str; 9] = [
    "cloudformationRoot",
    "config",
    "kmsKey",
    "name",
    "opsworksStacksRootRelative",
    "prefix",
    "region",
    "s3Bucket",
    "target",
];

fn well_known() -> WellKnownValues {
    let project = Project::new("web", "deploy-bucket", "acme", KmsKey::Shared("k".into()));
    WellKnownValues::for_project(
        &project,
        &Target::new("staging").unwrap(),
        "us-east-1",
        "k",
        "https://s3.amazonaws.com",
    )
}

/// Reserved names plus template-specific ones
fn parameter_name() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(RESERVED.to_vec()).prop_map(String::from),
        "custom[A-Z][a-z]{0,5}",
    ]
}

fn supplied() -> impl Strategy<Value = BTreeMap<String, ParameterValue>> {
    let value = prop_oneof![
        "[a-z0-9-]{1,12}".prop_map(ParameterValue::literal),
        "[a-z]{1,8}".prop_map(|key| ParameterValue::from_dependency("network", key)),
    ];
    prop::collection::btree_map(parameter_name(), value, 0..6)
}

proptest! {
    /// Property: reserved names always bind to the well-known value
    ///
    /// A caller-supplied value for a reserved name never wins.
    #[test]
    fn prop_well_known_takes_precedence(supplied in supplied()) {
        let declared: Vec<String> = RESERVED.iter().map(|s| s.to_string()).collect();
        let values = well_known();
        let bindings = plan_bindings(&declared, &values, &supplied).unwrap();

        for name in RESERVED {
            let expected = values.get(name).unwrap().to_string();
            prop_assert_eq!(bindings.get(name), Some(&Binding::Value(expected)));
        }
    }

    /// Property: binding succeeds exactly when every declared name has a source
    ///
    /// On failure the first unbound name in name order is reported.
    #[test]
    fn prop_unbound_name_is_reported(
        declared in prop::collection::btree_set(parameter_name(), 0..8),
        supplied in supplied(),
    ) {
        let declared: Vec<String> = declared.into_iter().collect();
        let values = well_known();
        let unbound: BTreeSet<&String> = declared
            .iter()
            .filter(|name| values.get(name).is_none() && !supplied.contains_key(*name))
            .collect();

        match plan_bindings(&declared, &values, &supplied) {
            Ok(bindings) => {
                prop_assert!(unbound.is_empty());
                prop_assert_eq!(bindings.len(), declared.len());
            }
            Err(FormationError::UnresolvedParameter(name)) => {
                prop_assert_eq!(unbound.iter().next().map(|n| n.as_str()), Some(name.as_str()));
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    /// Property: a dotted path finds the value it was built from
    #[test]
    fn prop_lookup_path_finds_nested_value(
        path in prop::collection::vec("[a-z]{1,6}", 1..5),
        leaf in "[a-z0-9-]{1,12}",
    ) {
        let document = path
            .iter()
            .rev()
            .fold(Value::String(leaf.clone()), |inner, segment| {
                let mut map = Map::new();
                map.insert(segment.clone(), inner);
                Value::Object(map)
            });

        prop_assert_eq!(lookup_path(&document, &path.join(".")), Some(&Value::String(leaf)));
    }
}
