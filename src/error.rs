use std::fmt;

/// the four fatal error kinds from the core's error model. anything that
/// isn't one of these (unrealised targets, clamped negatives) is reported
/// through an ordinary return value, never through this type.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// unknown pool name, unknown spatial unit, malformed indicator config.
    /// fatal at construction.
    Configuration { message: String, site: &'static str },
    /// row counts differ, matrix not square of order = pool count,
    /// operation index out of range.
    ShapeMismatch { message: String, site: &'static str },
    /// non-contiguous buffer, wrong element type at an FFI-style boundary.
    Numeric { message: String, site: &'static str },
    /// target < 0, target_var < 0, undefined classifier value, unmapped
    /// disturbance type, unrecognised sort type.
    Domain { message: String, site: &'static str },
}

impl EngineError {
    pub fn configuration(site: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into(), site }
    }

    pub fn shape(site: &'static str, message: impl Into<String>) -> Self {
        Self::ShapeMismatch { message: message.into(), site }
    }

    pub fn numeric(site: &'static str, message: impl Into<String>) -> Self {
        Self::Numeric { message: message.into(), site }
    }

    pub fn domain(site: &'static str, message: impl Into<String>) -> Self {
        Self::Domain { message: message.into(), site }
    }

    pub fn site(&self) -> &'static str {
        match self {
            Self::Configuration { site, .. }
            | Self::ShapeMismatch { site, .. }
            | Self::Numeric { site, .. }
            | Self::Domain { site, .. } => site,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { message, site } => {
                write!(f, "configuration error at {site}: {message}")
            }
            Self::ShapeMismatch { message, site } => {
                write!(f, "shape mismatch at {site}: {message}")
            }
            Self::Numeric { message, site } => write!(f, "numeric error at {site}: {message}"),
            Self::Domain { message, site } => write!(f, "domain error at {site}: {message}"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_site_and_message() {
        let e = EngineError::domain("rule_based_event", "target < 0");
        let rendered = format!("{e}");
        assert!(rendered.contains("rule_based_event"));
        assert!(rendered.contains("target < 0"));
        assert_eq!(e.site(), "rule_based_event");
    }
}
