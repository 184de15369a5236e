//! # Burn Record Utilities

use anyhow::Context;
use burn::prelude::Backend;
use burn::record::{HalfPrecisionSettings, Record};
use serde_json::{Map, Value};

const SHAPE_KEY: &str = "_shape";

fn shape_value(shape: Vec<usize>) -> Value {
    let mut obj: Map<String, Value> = Map::new();
    obj.insert(
        SHAPE_KEY.to_string(),
        Value::Array(shape.into_iter().map(Value::from).collect()),
    );
    Value::Object(obj)
}

fn shape_of_numeric_array(arr: &[Value]) -> Option<Vec<usize>> {
    match arr.first() {
        None => Some(vec![0]),
        Some(first) if first.is_number() => Some(vec![arr.len()]),
        Some(Value::Array(inner)) => {
            let inner_shape = shape_of_numeric_array(inner)?;
            Some(std::iter::once(arr.len()).chain(inner_shape).collect())
        }
        Some(_) => None,
    }
}

/// The shape of a serialized `TensorData`: ``{bytes, shape, dtype}``.
fn shape_of_tensor_data(obj: &Map<String, Value>) -> Option<Vec<usize>> {
    if !obj.contains_key("bytes") {
        return None;
    }
    obj.get("shape")?
        .as_array()?
        .iter()
        .map(|dim| dim.as_u64().map(|d| d as usize))
        .collect()
}

fn rewrite_value(value: Value) -> Value {
    match value {
        Value::Array(arr) => match shape_of_numeric_array(&arr) {
            Some(shape) => shape_value(shape),
            None => Value::Array(arr.into_iter().map(rewrite_value).collect()),
        },
        Value::Object(obj) => {
            if let Some(shape) = shape_of_tensor_data(&obj) {
                return shape_value(shape);
            }
            Value::Object(
                obj.into_iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k, rewrite_value(v)))
                    .collect(),
            )
        }
        v => v,
    }
}

/// Describe a module record as JSON, with every tensor
/// replaced by ``{"_shape": [...]}``.
///
/// # Example
///
/// ```rust,ignore
/// let shapes = parameter_shapes::<B, _>(model.into_record())?;
/// println!("{}", serde_json::to_string_pretty(&shapes)?);
/// ```
pub fn parameter_shapes<B: Backend, R: Record<B>>(record: R) -> anyhow::Result<Value> {
    let item = record.into_item::<HalfPrecisionSettings>();
    let value = serde_json::to_value(&item).context("serializing record")?;
    Ok(rewrite_value(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::blocks::conv_norm::{ConvNorm2d, ConvNorm2dConfig};
    use burn::backend::NdArray;
    use burn::module::Module;
    use serde_json::json;

    #[test]
    fn test_rewrite_value() {
        let value = json!({
            "a": [[1, 2, 3], [4, 5, 6]],
            "b": {"bytes": [0, 0], "shape": [2, 1], "dtype": "F16"},
            "c": null,
            "d": "name",
        });
        assert_eq!(
            rewrite_value(value),
            json!({
                "a": {"_shape": [2, 3]},
                "b": {"_shape": [2, 1]},
                "d": "name",
            })
        );
    }

    #[test]
    fn test_parameter_shapes() {
        type B = NdArray<f32>;
        let device = Default::default();

        let layer: ConvNorm2d<B> = ConvNorm2dConfig::new(2, 4, 3).init(&device);
        let shapes = parameter_shapes::<B, _>(layer.into_record()).unwrap();
        let text = shapes.to_string();

        assert!(text.contains(r#"{"_shape":[4,2,3,3]}"#));
        assert!(text.contains(r#"{"_shape":[4]}"#));
        assert!(!text.contains("bytes"));
    }
}
