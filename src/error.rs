use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// Declared mime type outside the accepted set. Raised before any text
    /// is extracted.
    #[error("Only .doc, .docx, and .txt formats allowed!")]
    UnsupportedType(String),

    #[error("No file uploaded")]
    MissingFile,

    /// Anything that went wrong reading, extracting or saving the document.
    #[error("Document conversion failed: {0}")]
    Conversion(String),
}

impl ConvertError {
    /// Wrap any collaborator failure with the uniform conversion message.
    pub fn conversion(err: impl std::fmt::Display) -> Self {
        ConvertError::Conversion(err.to_string())
    }
}

impl From<anyhow::Error> for ConvertError {
    fn from(err: anyhow::Error) -> Self {
        ConvertError::Conversion(format!("{:#}", err))
    }
}
