use serde_json::{Map, Value};

use super::{label_list, text_field};

/// A job posting as submitted by the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Job {
    /// Echoed verbatim into metadata and batch reports; `Value::Null` when absent.
    pub id: Value,
    pub title: Option<String>,
    pub company: Option<String>,
    pub required_skills: Vec<String>,
    /// Free-text salary descriptor, e.g. "R$ 12.000" or "120k-140k USD".
    pub salary: Option<String>,
}

impl Job {
    pub fn from_json(map: &Map<String, Value>) -> Self {
        Self {
            id: map.get("id").cloned().unwrap_or(Value::Null),
            title: text_field(map, "title"),
            company: text_field(map, "company"),
            required_skills: label_list(map, "required_skills"),
            salary: text_field(map, "salary"),
        }
    }
}
