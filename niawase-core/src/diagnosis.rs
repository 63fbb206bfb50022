use crate::types::StyleKey;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Category -> attribute -> finding, in the order the remote model produced them.
pub type Analysis = IndexMap<String, IndexMap<String, String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    #[serde(deserialize_with = "de_analysis")]
    pub analysis: Analysis,
    pub proposals: Proposals,
    #[serde(rename = "image_generation_prompts", default)]
    pub image_prompts: IndexMap<StyleKey, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposals {
    pub hairstyles: Vec<Suggestion>,
    pub hair_colors: Vec<Suggestion>,
    #[serde(default)]
    pub makeup: IndexMap<String, String>,
    #[serde(default)]
    pub fashion: IndexMap<String, String>,
    #[serde(default)]
    pub overall_comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl DiagnosisResult {
    pub fn base_prompt(&self, key: &StyleKey) -> Option<&str> {
        self.image_prompts.get(key).map(String::as_str)
    }

    pub fn style_keys(&self) -> impl Iterator<Item = &StyleKey> {
        self.image_prompts.keys()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiagnosisShapeError {
    #[error("diagnosis payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("diagnosis payload is not a JSON object")]
    NotAnObject,
    #[error("diagnosis payload is missing `{0}`")]
    MissingField(&'static str),
    #[error("diagnosis payload has an unexpected shape: {0}")]
    Shape(String),
}

/// Accepts the remote result either as an embedded object or as a string
/// holding the model's JSON text.
pub fn parse_diagnosis(payload: Value) -> Result<DiagnosisResult, DiagnosisShapeError> {
    let doc = match payload {
        Value::String(text) => serde_json::from_str::<Value>(strip_code_fence(&text))
            .map_err(|e| DiagnosisShapeError::InvalidJson(e.to_string()))?,
        other => other,
    };

    let obj = doc.as_object().ok_or(DiagnosisShapeError::NotAnObject)?;
    for field in ["analysis", "proposals"] {
        if obj.get(field).is_none_or(Value::is_null) {
            return Err(DiagnosisShapeError::MissingField(field));
        }
    }

    serde_json::from_value(doc).map_err(|e| DiagnosisShapeError::Shape(e.to_string()))
}

// Models occasionally wrap JSON output in a markdown fence despite the JSON mime type.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn de_analysis<'de, D>(deserializer: D) -> Result<Analysis, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: IndexMap<String, IndexMap<String, Value>> = IndexMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(category, attrs)| {
            let attrs = attrs
                .into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (k, v)
                })
                .collect();
            (category, attrs)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "analysis": {
                "face": {"目": "アーモンド形", "鼻": "すっきり"},
                "hair": {"ボリューム感": 3}
            },
            "proposals": {
                "hairstyles": [
                    {"name": "Layered medium", "description": "soft"},
                    {"name": "Short bob", "description": "sleek"}
                ],
                "hair_colors": [
                    {"name": "Ash beige", "description": "airy"},
                    {"name": "Coral pink", "description": "glossy"}
                ],
                "makeup": {"リップカラー": "coral"},
                "fashion": {"基本カラー": "navy"},
                "overall_comment": "Great balance."
            },
            "image_generation_prompts": {
                "style_1": "medium layered cut, ash beige",
                "style_2": "short bob, coral pink"
            }
        })
    }

    #[test]
    fn parses_embedded_object() {
        let d = parse_diagnosis(sample()).unwrap();
        assert_eq!(d.proposals.hairstyles.len(), 2);
        assert_eq!(
            d.base_prompt(&StyleKey::new("style_2")),
            Some("short bob, coral pink")
        );
        // Non-string findings are kept as their JSON text.
        assert_eq!(d.analysis["hair"]["ボリューム感"], "3");
        let categories: Vec<_> = d.analysis.keys().cloned().collect();
        assert_eq!(categories, vec!["face", "hair"]);
    }

    #[test]
    fn parses_json_text_payload() {
        let text = sample().to_string();
        let d = parse_diagnosis(Value::String(text)).unwrap();
        assert_eq!(d.style_keys().count(), 2);
    }

    #[test]
    fn parses_fenced_json_text() {
        let text = format!("```json\n{}\n```", sample());
        assert!(parse_diagnosis(Value::String(text)).is_ok());
    }

    #[test]
    fn missing_analysis_or_proposals_is_rejected() {
        let mut v = sample();
        v.as_object_mut().unwrap().remove("analysis");
        assert_eq!(
            parse_diagnosis(v),
            Err(DiagnosisShapeError::MissingField("analysis"))
        );

        let mut v = sample();
        v["proposals"] = Value::Null;
        assert_eq!(
            parse_diagnosis(v),
            Err(DiagnosisShapeError::MissingField("proposals"))
        );
    }

    #[test]
    fn garbage_text_is_invalid_json() {
        let err = parse_diagnosis(Value::String("not json".into())).unwrap_err();
        assert!(matches!(err, DiagnosisShapeError::InvalidJson(_)));
        assert_eq!(
            parse_diagnosis(json!([1, 2])),
            Err(DiagnosisShapeError::NotAnObject)
        );
    }

    #[test]
    fn wrong_proposal_shape_is_rejected() {
        let mut v = sample();
        v["proposals"]["hairstyles"] = json!("two styles");
        assert!(matches!(
            parse_diagnosis(v),
            Err(DiagnosisShapeError::Shape(_))
        ));
    }
}
