// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors that abort creation of a client
#[derive(Debug, thiserror::Error)]
pub enum Creation {
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build transport client: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to serialize client configuration: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write client configuration: {0}")]
    Render(#[from] std::io::Error),
}

/// Errors produced while turning a batch into a push request payload.
///
/// These never stop the pipeline: the caller skips whatever depended on the
/// payload and moves on.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Invalid label name '{name}'")]
    InvalidLabelName { name: String },

    #[error("Failed to encode push request: {0}")]
    Protobuf(#[from] prost::EncodeError),

    #[error("Failed to compress push request: {0}")]
    Compression(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = Creation::InvalidConfig("url must not be empty".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid client configuration: url must not be empty"
        );

        let error = EncodeError::InvalidLabelName {
            name: "1job".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid label name '1job'");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::other("broken pipe");
        let error: Creation = io.into();
        assert!(matches!(error, Creation::Render(_)));
    }
}
