//! Versioned JSON envelope for the annotation list. Cached patches are never written.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::annotation::model::{Annotation, AnnotationId, AnnotationKind};
use crate::foundation::error::{PixmarkError, PixmarkResult};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    version: u32,
    annotations: &'a [Annotation],
}

#[derive(Deserialize)]
struct EnvelopeIn {
    version: u32,
    annotations: Vec<Value>,
}

#[tracing::instrument(level = "debug", skip(annotations), fields(count = annotations.len()))]
pub fn serialize(annotations: &[Annotation]) -> PixmarkResult<String> {
    let env = EnvelopeOut {
        version: FORMAT_VERSION,
        annotations,
    };
    serde_json::to_string_pretty(&env)
        .map_err(|e| PixmarkError::evaluation(format!("serialize annotations: {e}")))
}

/// Parse persisted markup. Any bad record fails the whole call; patches come back empty.
#[tracing::instrument(level = "debug", skip(text), fields(bytes = text.len()))]
pub fn deserialize(text: &str) -> PixmarkResult<Vec<Annotation>> {
    let root: Value = serde_json::from_str(text)?;
    let records = match root {
        Value::Array(records) => records,
        Value::Object(_) => {
            let env: EnvelopeIn = serde_json::from_value(root)?;
            if env.version != FORMAT_VERSION {
                return Err(PixmarkError::decode(format!(
                    "unsupported markup version {} (expected {FORMAT_VERSION})",
                    env.version
                )));
            }
            env.annotations
        }
        other => {
            return Err(PixmarkError::decode(format!(
                "expected an object or array at top level, got {}",
                json_kind(&other)
            )));
        }
    };

    let mut out = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        out.push(decode_record(i, record)?);
    }
    for a in &out {
        AnnotationId::observe(a.id);
    }
    tracing::debug!(count = out.len(), "decoded annotations");
    Ok(out)
}

fn decode_record(index: usize, record: Value) -> PixmarkResult<Annotation> {
    let tag = match record.get("type") {
        Some(Value::String(s)) => s.as_str(),
        Some(other) => {
            return Err(PixmarkError::decode(format!(
                "record {index}: `type` must be a string, got {}",
                json_kind(other)
            )));
        }
        None => {
            return Err(PixmarkError::decode(format!(
                "record {index}: missing `type` discriminator"
            )));
        }
    };
    if !AnnotationKind::DISCRIMINATORS.contains(&tag) {
        return Err(PixmarkError::decode(format!(
            "record {index}: unknown annotation type `{tag}`"
        )));
    }
    serde_json::from_value(record)
        .map_err(|e| PixmarkError::decode(format!("record {index}: {e}")))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::model::Style;
    use crate::annotation::tool::Tool;
    use crate::foundation::core::{Color, Point};

    fn marker() -> Annotation {
        Annotation::new(
            Tool::Number,
            AnnotationKind::Number {
                value: 3,
                radius: 12.0,
            },
            Style {
                stroke: Color::WHITE,
                stroke_width: 2.0,
                fill: Some(Color::RED),
                shadow: false,
            },
            Point::new(5.0, 6.0),
            Point::new(5.0, 6.0),
        )
    }

    #[test]
    fn writes_versioned_envelope() {
        let text = serialize(&[marker()]).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["version"], 1);
        let rec = &v["annotations"][0];
        assert_eq!(rec["type"], "number");
        assert_eq!(rec["style"]["fill"], "#FF0000FF");
        assert_eq!(rec["start"], serde_json::json!([5.0, 6.0]));
        assert!(rec.get("patch").is_none());
    }

    #[test]
    fn accepts_bare_array() {
        let text = serialize(&[marker()]).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        let bare = serde_json::to_string(&v["annotations"]).unwrap();
        let back = deserialize(&bare).unwrap();
        assert_eq!(back, vec![marker_with_id(&back[0])]);
    }

    fn marker_with_id(a: &Annotation) -> Annotation {
        Annotation { id: a.id, ..marker() }
    }

    #[test]
    fn unknown_discriminator_fails_whole_load() {
        let text = r##"[
            {"id":1,"tool":"line","style":{"stroke":"#000000","stroke_width":1},
             "start":[0,0],"end":[1,1],"type":"line"},
            {"id":2,"tool":"line","style":{"stroke":"#000000","stroke_width":1},
             "start":[0,0],"end":[1,1],"type":"hexagon"}
        ]"##;
        let err = deserialize(text).unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("record 1"));
        assert!(err.to_string().contains("hexagon"));
    }

    #[test]
    fn rejects_other_versions_and_shapes() {
        assert!(deserialize(r#"{"version":2,"annotations":[]}"#).unwrap_err().is_decode());
        assert!(deserialize("42").unwrap_err().is_decode());
        assert!(deserialize("not json").unwrap_err().is_decode());
        assert!(deserialize(r#"[{"id":1}]"#).unwrap_err().is_decode());
    }

    #[test]
    fn loaded_ids_are_not_reissued() {
        let text = r##"[{"id":900000,"tool":"ellipse","style":{"stroke":"#000000","stroke_width":1},
                        "start":[0,0],"end":[4,4],"type":"ellipse"}]"##;
        let back = deserialize(text).unwrap();
        assert_eq!(back[0].id, AnnotationId(900_000));
        assert!(AnnotationId::fresh().0 > 900_000);
    }
}
