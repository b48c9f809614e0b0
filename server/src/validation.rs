use crate::error::ApiError;

/// Maximum text length for synthesis requests
const MAX_INPUT_LENGTH: usize = 5000;

/// Validate a synthesis request body
pub fn validate_speech_request(model: &str, input: &str) -> Result<(), ApiError> {
    if model.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "Model name cannot be empty".to_string(),
        ));
    }

    if input.is_empty() {
        return Err(ApiError::InvalidInput(
            "Input text cannot be empty".to_string(),
        ));
    }
    if input.len() > MAX_INPUT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Input text too long (max {} characters)",
            MAX_INPUT_LENGTH
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_speech_request_valid() {
        assert!(validate_speech_request("voiceA", "Hello").is_ok());
    }

    #[test]
    fn test_validate_speech_request_empty_input() {
        let result = validate_speech_request("voiceA", "");
        assert!(result.is_err());
        if let Err(ApiError::InvalidInput(msg)) = result {
            assert!(msg.contains("empty"));
        }
    }

    #[test]
    fn test_validate_speech_request_too_long() {
        let long_input = "a".repeat(6000);
        let result = validate_speech_request("voiceA", &long_input);
        assert!(result.is_err());
        if let Err(ApiError::InvalidInput(msg)) = result {
            assert!(msg.contains("too long"));
        }
    }

    #[test]
    fn test_validate_speech_request_blank_model() {
        assert!(validate_speech_request("", "Hello").is_err());
        assert!(validate_speech_request("   ", "Hello").is_err());
    }
}
