use serde_json::Value;

/// Limits applied to JSON that arrives from the browser or from upstream.
#[derive(Debug, Clone, Copy)]
pub struct JsonLimits {
    pub max_bytes: usize,
    pub max_depth: usize,
}

impl Default for JsonLimits {
    fn default() -> Self {
        Self {
            max_bytes: 4 * 1024 * 1024,
            max_depth: 64,
        }
    }
}

impl JsonLimits {
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JsonLimitError {
    #[error("JSON too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
    #[error("JSON nested too deeply (max depth: {max})")]
    TooDeep { max: usize },
    #[error("JSON parsing error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parse `data` as JSON, rejecting oversized or pathologically nested documents.
pub fn parse_bounded(data: &[u8], limits: &JsonLimits) -> Result<Value, JsonLimitError> {
    if data.len() > limits.max_bytes {
        return Err(JsonLimitError::TooLarge {
            size: data.len(),
            max: limits.max_bytes,
        });
    }
    let value: Value = serde_json::from_slice(data)?;
    check_depth(&value, limits.max_depth)?;
    Ok(value)
}

fn check_depth(root: &Value, max_depth: usize) -> Result<(), JsonLimitError> {
    let mut stack = vec![(root, 0usize)];
    while let Some((value, depth)) = stack.pop() {
        if depth > max_depth {
            return Err(JsonLimitError::TooDeep { max: max_depth });
        }
        match value {
            Value::Array(items) => stack.extend(items.iter().map(|v| (v, depth + 1))),
            Value::Object(map) => stack.extend(map.values().map(|v| (v, depth + 1))),
            _ => {}
        }
    }
    Ok(())
}
