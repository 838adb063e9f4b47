//! Template-data derivation for operation results.

use std::any::Any;
use std::collections::BTreeMap;

use gantry_proto::registry;

/// Returns the templating values for an erased operation result.
///
/// When the result's message type provides template data (via
/// [`gantry_proto::Message::template_data`]) those values win; otherwise a
/// map is auto-derived from the exported scalar fields of the JSON
/// rendering. Nested objects and arrays are not templated.
#[must_use]
pub fn template_data(
    value: &(dyn Any + Send + Sync),
    rendered_json: &str,
) -> BTreeMap<String, serde_json::Value> {
    if let Some(data) = registry::template_data_dyn(value) {
        return data;
    }
    derive_from_json(rendered_json)
}

fn derive_from_json(rendered_json: &str) -> BTreeMap<String, serde_json::Value> {
    let Ok(serde_json::Value::Object(fields)) = serde_json::from_str(rendered_json) else {
        return BTreeMap::new();
    };
    fields
        .into_iter()
        .filter(|(_, value)| {
            matches!(
                value,
                serde_json::Value::String(_)
                    | serde_json::Value::Number(_)
                    | serde_json::Value::Bool(_)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};

    use gantry_proto::{registry, Message};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct PlainResult {
        id: String,
        replicas: i64,
        ready: bool,
        nested: Vec<String>,
    }

    impl Message for PlainResult {
        const TYPE_URL: &'static str = "gantry.test.template.PlainResult";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct CustomResult {
        id: String,
    }

    impl Message for CustomResult {
        const TYPE_URL: &'static str = "gantry.test.template.CustomResult";

        fn template_data(&self) -> Option<BTreeMap<String, serde_json::Value>> {
            let mut data = BTreeMap::new();
            data.insert("custom_id".to_owned(), serde_json::json!(self.id));
            Some(data)
        }
    }

    #[test]
    fn auto_derives_scalar_fields_only() {
        registry::register::<PlainResult>().expect("register");
        let result = PlainResult {
            id: "d1".into(),
            replicas: 3,
            ready: true,
            nested: vec!["x".into()],
        };
        let json = serde_json::to_string(&result).expect("serialize");
        let erased: Arc<dyn Any + Send + Sync> = Arc::new(result);

        let data = template_data(erased.as_ref(), &json);
        assert_eq!(data.get("id"), Some(&serde_json::json!("d1")));
        assert_eq!(data.get("replicas"), Some(&serde_json::json!(3)));
        assert_eq!(data.get("ready"), Some(&serde_json::json!(true)));
        assert!(!data.contains_key("nested"));
    }

    #[test]
    fn message_provided_template_data_wins() {
        registry::register::<CustomResult>().expect("register");
        let result = CustomResult { id: "d2".into() };
        let json = serde_json::to_string(&result).expect("serialize");
        let erased: Arc<dyn Any + Send + Sync> = Arc::new(result);

        let data = template_data(erased.as_ref(), &json);
        assert_eq!(data.get("custom_id"), Some(&serde_json::json!("d2")));
        assert!(!data.contains_key("id"));
    }

    #[test]
    fn malformed_json_yields_empty_map() {
        let erased: Arc<dyn Any + Send + Sync> = Arc::new(42_u8);
        assert!(template_data(erased.as_ref(), "not json").is_empty());
    }
}
