use serde_json::{Map, Value};

use super::JobError;

/// 解析调用方提供的参数文本。
///
/// 空白文本视为 `{}`；其余必须是 JSON 对象，否则返回 `InvalidParams`。
/// 解析发生在任何网络请求之前。
pub fn parse_params(text: &str) -> Result<Map<String, Value>, JobError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(JobError::InvalidParams(format!(
            "期望对象，实际为 {}",
            json_kind(&other)
        ))),
        Err(e) => Err(JobError::InvalidParams(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "布尔值",
        Value::Number(_) => "数字",
        Value::String(_) => "字符串",
        Value::Array(_) => "数组",
        Value::Object(_) => "对象",
    }
}
