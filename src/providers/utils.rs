use anyhow::Result;
use reqwest::Client;
use std::time::Duration;

/// Builds the HTTP client every provider uses. The timeout bounds the whole
/// request; there is no retry on top of it.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

/// Strips the wrapping that chat models like to put around JSON: code fences,
/// a `json` language tag and any prose before the first bracket or after the
/// last one.
pub fn extract_json_block(response: &str) -> &str {
    let trimmed = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let start = trimmed.find(|c| c == '[' || c == '{');
    let end = trimmed.rfind(|c| c == ']' || c == '}');

    match (start, end) {
        (Some(start), Some(end)) if start <= end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_block_from_fenced_response() {
        let response = "```json\n[{\"question\": \"q\"}]\n```";
        assert_eq!(extract_json_block(response), "[{\"question\": \"q\"}]");
    }

    #[test]
    fn test_extract_json_block_with_prose() {
        let response = "Here is your quiz:\n[{\"a\": 1}]\nGood luck!";
        assert_eq!(extract_json_block(response), "[{\"a\": 1}]");
    }

    #[test]
    fn test_extract_json_block_without_json() {
        assert_eq!(extract_json_block("  no json here "), "no json here");
    }
}
