/// Default base URL of a locally running backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
/// Path of the execute endpoint relative to the base URL.
pub const EXECUTE_PATH: &str = "/execute";
/// Path of the explain endpoint relative to the base URL.
pub const EXPLAIN_PATH: &str = "/explain";
/// Path of the streaming suggestion channel relative to the base URL.
pub const STREAM_PATH: &str = "/ws/code-suggestions";

/// Normalize a user-supplied base URL.
///
/// Blank input falls back to [`DEFAULT_BASE_URL`]; surrounding whitespace and
/// trailing slashes are removed.
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

/// Join an endpoint path onto a base URL.
pub fn endpoint_url(base: &str, path: &str) -> String {
    let base = normalize_base_url(base);
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

/// Derive the streaming channel URL from a base URL.
///
/// Normalization rules:
/// 1) `http://` becomes `ws://` and `https://` becomes `wss://`
/// 2) `ws://`/`wss://` schemes are kept
/// 3) an existing `/ws/code-suggestions` suffix is kept, otherwise appended
pub fn stream_url(base: &str) -> String {
    let base = normalize_base_url(base);
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base
    };

    if base.ends_with(STREAM_PATH) {
        return base;
    }
    format!("{base}{STREAM_PATH}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_collapses_duplicate_slashes() {
        assert_eq!(
            endpoint_url("http://localhost:8000/", "/execute"),
            "http://localhost:8000/execute"
        );
    }

    #[test]
    fn blank_base_falls_back_to_default() {
        assert_eq!(normalize_base_url("   "), DEFAULT_BASE_URL);
    }
}
