use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Rejection type for the reassembly endpoint
#[derive(Debug)]
pub enum ChunkRejection {
    /// File name failed validation, or the chunk violated a size limit.
    /// The wire contract reports every client-side rejection the same way:
    /// 403 with the escaped offending name echoed back.
    Invalid { file_name: String },
    /// Malformed request (missing or unparsable protocol headers)
    BadRequest(String),
    /// I/O or other server-side failure
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ChunkRejection {
    fn from(err: anyhow::Error) -> Self {
        ChunkRejection::Internal(err)
    }
}

impl From<std::io::Error> for ChunkRejection {
    fn from(err: std::io::Error) -> Self {
        ChunkRejection::Internal(err.into())
    }
}

impl IntoResponse for ChunkRejection {
    fn into_response(self) -> Response {
        match self {
            ChunkRejection::Invalid { file_name } => {
                tracing::warn!(target: "server::error", status = 403, file = %file_name, "Chunk rejected");
                (
                    StatusCode::FORBIDDEN,
                    format!("Invalid file name:{}", escape_html(&file_name)),
                )
                    .into_response()
            }
            ChunkRejection::BadRequest(msg) => {
                tracing::warn!(target: "server::error", status = 400, error = %msg, "Bad chunk request");
                (StatusCode::BAD_REQUEST, msg).into_response()
            }
            ChunkRejection::Internal(err) => {
                tracing::error!(target: "server::error", status = 500, error = ?err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
                    .into_response()
            }
        }
    }
}

/// Escape a file name for safe display in an error body
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
