// Copyright (c) 2025 - Cowboy AI, Inc.
//! Intrinsic function helpers for template documents

use serde_json::{json, Value};

/// Pseudo parameter holding the stack region
pub const AWS_REGION: &str = "AWS::Region";

/// `{"Ref": name}`
pub fn reference(name: &str) -> Value {
    json!({ "Ref": name })
}

/// `{"Fn::GetAtt": [id, attribute]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::FindInMap": [map, {"Ref": "AWS::Region"}, key]}`
pub fn find_in_region_map(map: &str, key: &str) -> Value {
    json!({ "Fn::FindInMap": [map, reference(AWS_REGION), key] })
}

/// `{"Fn::Join": [delimiter, parts]}`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{"Fn::Base64": value}`
pub fn base64(value: Value) -> Value {
    json!({ "Fn::Base64": value })
}

/// Resource tag
pub fn tag(key: &str, value: Value) -> Value {
    json!({ "Key": key, "Value": value })
}

/// `Name` tag of the form `{prefix}-{name}-{target}-{suffix}`
pub fn name_tag(suffix: &str) -> Value {
    tag(
        "Name",
        join(
            "-",
            vec![
                reference("prefix"),
                reference("name"),
                reference("target"),
                Value::String(suffix.to_string()),
            ],
        ),
    )
}
