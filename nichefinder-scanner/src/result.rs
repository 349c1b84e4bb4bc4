use serde::Deserialize;

/// Wire shape of the completion endpoint's response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionResponse {
    #[serde(default)]
    pub suggestions: Vec<SuggestionEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionEntry {
    #[serde(default)]
    pub value: Option<String>,
}

impl SuggestionResponse {
    /// Suggestion values in endpoint order, trimmed, with blank entries dropped.
    pub fn into_values(self) -> Vec<String> {
        self.suggestions
            .into_iter()
            .filter_map(|entry| entry.value)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }
}

/// Decode a response body. A body that is not JSON, or JSON of the wrong
/// shape, is reported as an error message.
pub fn parse_suggestions(body: &str) -> Result<Vec<String>, String> {
    let response: SuggestionResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed response: {}", e))?;
    Ok(response.into_values())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_endpoint_order() {
        let body = r#"{"suggestions":[{"value":"crossword puzzles for kids"},{"value":"crossword for adults"}]}"#;
        let values = parse_suggestions(body).unwrap();
        assert_eq!(
            values,
            vec!["crossword puzzles for kids", "crossword for adults"]
        );
    }

    #[test]
    fn test_parse_skips_blank_and_missing_values() {
        let body = r#"{"suggestions":[{"value":"  "},{"type":"KEYWORD"},{"value":" sudoku "}]}"#;
        assert_eq!(parse_suggestions(body).unwrap(), vec!["sudoku"]);
    }

    #[test]
    fn test_parse_missing_suggestions_key_is_empty() {
        assert!(parse_suggestions(r#"{"prefix":"abc"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(parse_suggestions(r#"{"suggestions":"nope"}"#).is_err());
        assert!(parse_suggestions("<html>blocked</html>").is_err());
    }
}
