use thiserror::Error;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("could not read draft file: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required section [{0}]")]
    MissingSection(String),

    #[error("missing required field {section}.{field}")]
    MissingRequiredField { section: String, field: String },

    #[error("invalid value for {section}.{field}: {reason}")]
    InvalidValue {
        section: String,
        field: String,
        reason: String,
    },

    #[error("illegal color value")]
    Color(#[from] dobby_color::ColorError),

    #[error("{0}")]
    Syntax(String),
}
