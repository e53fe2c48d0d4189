use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to open store at {path}"))]
    Connect {
        path: String,
        #[snafu(source)]
        source: sqlx::Error,
    },

    #[snafu(display("Error returned from database"))]
    Sqlx {
        #[snafu(source)]
        source: sqlx::Error,
    },

    #[snafu(display("Malformed document {id}"))]
    Document {
        id: String,
        #[snafu(source)]
        source: serde_json::Error,
    },

    #[snafu(display("Document {id} holds UniqueMessageId {document_id}"))]
    KeyMismatch { id: String, document_id: String },

    #[snafu(display("Failed message {id} already exists"))]
    AlreadyExists { id: String },

    #[snafu(display("Document not found: {resource}"))]
    NotFound { resource: String },

    #[snafu(display("Invalid parameter: {message}"))]
    InvalidParameter { message: String },
}

impl From<sqlx::Error> for Error {
    fn from(source: sqlx::Error) -> Self {
        Self::Sqlx { source }
    }
}

impl Error {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn message_not_found(id: impl AsRef<str>) -> Self {
        Self::not_found(format!("failed message {}", id.as_ref()))
    }
}
