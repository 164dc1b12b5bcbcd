/// 处理后端返回值格式不一致的序列化/反序列化辅助模块

use serde::{Deserialize, Deserializer};

/// 记录ID可能是字符串也可能是数字 (例如: "a1b2" 或 42)
pub mod id_string {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IdValue {
            String(String),
            Number(serde_json::Number),
        }

        match IdValue::deserialize(deserializer)? {
            IdValue::String(s) => Ok(s),
            IdValue::Number(n) => Ok(n.to_string()),
        }
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IdValue {
            String(String),
            Number(serde_json::Number),
        }

        Ok(match Option::<IdValue>::deserialize(deserializer)? {
            Some(IdValue::String(s)) => Some(s),
            Some(IdValue::Number(n)) => Some(n.to_string()),
            None => None,
        })
    }
}

/// 字符串列表：可能是数组、JSON编码的字符串或 null
///
/// Older rows store `goals` as `"[\"growth\"]"`; a plain comma list is
/// accepted too.
pub mod string_list {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ListValue {
            List(Vec<String>),
            Encoded(String),
        }

        match Option::<ListValue>::deserialize(deserializer)? {
            None => Ok(Vec::new()),
            Some(ListValue::List(items)) => Ok(items),
            Some(ListValue::Encoded(raw)) => {
                let raw = raw.trim();
                if raw.is_empty() {
                    return Ok(Vec::new());
                }
                match serde_json::from_str::<Vec<String>>(raw) {
                    Ok(items) => Ok(items),
                    Err(_) => Ok(crate::utils::validation::parse_goals(raw)),
                }
            }
        }
    }
}

/// 嵌入关系：一对一关系可能返回对象，也可能返回数组
pub mod one_or_many {
    use super::*;

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany<T> {
            Many(Vec<T>),
            One(T),
        }

        Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
            None => Vec::new(),
            Some(OneOrMany::Many(items)) => items,
            Some(OneOrMany::One(item)) => vec![item],
        })
    }
}
