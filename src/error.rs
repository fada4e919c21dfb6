use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum RenderError {
    TemplateMissing(PathBuf),
    TemplateCorrupt { asset: String, message: String },
    TemplateFingerprintMismatch { asset: String, expected: String, found: String },
    InvalidConfiguration(String),
    Pdf(String),
    Io(std::io::Error),
}

impl RenderError {
    /// Load failures are the only class a caller is expected to surface as fatal.
    pub fn is_template_failure(&self) -> bool {
        matches!(
            self,
            RenderError::TemplateMissing(_)
                | RenderError::TemplateCorrupt { .. }
                | RenderError::TemplateFingerprintMismatch { .. }
        )
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::TemplateMissing(path) => {
                write!(f, "template asset not found: {}", path.display())
            }
            RenderError::TemplateCorrupt { asset, message } => {
                write!(f, "template asset {} is unusable: {}", asset, message)
            }
            RenderError::TemplateFingerprintMismatch {
                asset,
                expected,
                found,
            } => write!(
                f,
                "template asset {} fingerprint mismatch: expected {} found {}",
                asset, expected, found
            ),
            RenderError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            RenderError::Pdf(message) => write!(f, "pdf error: {}", message),
            RenderError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(value: std::io::Error) -> Self {
        RenderError::Io(value)
    }
}

impl From<lopdf::Error> for RenderError {
    fn from(value: lopdf::Error) -> Self {
        RenderError::Pdf(value.to_string())
    }
}
