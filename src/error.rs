/// Result alias carrying [`KeysongError`].
pub type Result<T> = std::result::Result<T, KeysongError>;

#[derive(Debug, thiserror::Error)]
pub enum KeysongError {
    /// Mood id outside the closed set known to the engine.
    #[error("unknown mood '{0}'")]
    UnknownMood(String),
    #[error("unknown instrument '{0}'")]
    UnknownInstrument(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
}

impl KeysongError {
    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mood_message_names_the_id() {
        let err = KeysongError::UnknownMood("disco".to_string());
        assert_eq!(err.to_string(), "unknown mood 'disco'");
    }

    #[test]
    fn json_errors_convert() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: KeysongError = parse.unwrap_err().into();
        assert!(matches!(err, KeysongError::Json(_)));
    }
}
