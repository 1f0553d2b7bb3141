use serde_json::{Map, Value};

use super::{label_list, non_negative_int, text_field};

/// A job candidate as submitted by the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    /// Echoed verbatim into metadata; `Value::Null` when absent.
    pub id: Value,
    pub name: Option<String>,
    /// Current job title.
    pub title: Option<String>,
    pub experience_years: u32,
    pub skills: Vec<String>,
}

impl Candidate {
    pub fn from_json(map: &Map<String, Value>) -> Self {
        Self {
            id: map.get("id").cloned().unwrap_or(Value::Null),
            name: text_field(map, "name"),
            title: text_field(map, "title"),
            experience_years: non_negative_int(map, "experience_years"),
            skills: label_list(map, "skills"),
        }
    }
}
