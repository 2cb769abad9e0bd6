//! Request handlers for the reassembly endpoint

use crate::server::ServerState;
use crate::server::error::ChunkRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ChunkRejection> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ChunkRejection::BadRequest(format!("Missing or invalid {name} header")))
}

fn header_u64(headers: &HeaderMap, name: &str) -> Result<u64, ChunkRejection> {
    header_str(headers, name)?
        .parse()
        .map_err(|_| ChunkRejection::BadRequest(format!("Missing or invalid {name} header")))
}

/// File-name allow-list: a non-empty stem of alphanumerics, spaces,
/// hyphens, underscores or parentheses, one dot, and an allowed extension
pub fn is_allowed_name(file_name: &str, allowed_extensions: &[String]) -> bool {
    let Some((stem, extension)) = file_name.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty()
        || !stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '(' | ')'))
    {
        return false;
    }
    allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(extension))
}

/// Receive one chunk: validate it, append it to the session's temporary
/// file, and on the final send rename the temporary file into place.
///
/// The final send is the one whose `X-Chunk-Current` equals
/// `X-Chunk-Count` (the shared off-by-one counting convention; see
/// `ChunkPlan`). Every client-side rejection produces the same 403
/// response echoing the escaped file name.
pub async fn receive_chunk(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ChunkRejection> {
    let file_name = header_str(&headers, "x-file-name")?.to_string();
    let chunk_count = header_u64(&headers, "x-chunk-count")?;
    let current_chunk = header_u64(&headers, "x-chunk-current")?;

    debug!(
        target: "server::upload",
        file = %file_name,
        chunk = current_chunk,
        count = chunk_count,
        size = body.len(),
        "Received chunk"
    );

    if !is_allowed_name(&file_name, &state.config.allowed_extensions) {
        warn!(target: "server::upload", file = %file_name, "File name not allowed");
        return Err(ChunkRejection::Invalid { file_name });
    }

    // validate the whole chunk payload before touching the temp file
    if body.len() as u64 > state.config.chunk_size {
        warn!(
            target: "server::upload",
            file = %file_name,
            size = body.len(),
            limit = state.config.chunk_size,
            "Chunk exceeds configured chunk size"
        );
        return Err(ChunkRejection::Invalid { file_name });
    }

    let tmp_dir = state.config.tmp_dir();
    tokio::fs::create_dir_all(tmp_dir).await?;

    // only generate a fresh temporary name on the first chunk
    let temp_name = if current_chunk == 0 {
        state.store.assign(&file_name, tmp_dir).await?
    } else {
        match state.store.get(&file_name) {
            Some(name) => name,
            None => {
                warn!(target: "server::upload", file = %file_name, "No session for non-initial chunk");
                return Err(ChunkRejection::Invalid { file_name });
            }
        }
    };
    let temp_path = tmp_dir.join(&temp_name);

    if let Ok(meta) = tokio::fs::metadata(&temp_path).await {
        if meta.len() > state.config.max_file_size {
            warn!(
                target: "server::upload",
                file = %file_name,
                accumulated = meta.len(),
                limit = state.config.max_file_size,
                "Accumulated file exceeds maximum size"
            );
            return Err(ChunkRejection::Invalid { file_name });
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&temp_path)
        .await?;
    file.write_all(&body).await?;
    file.flush().await?;

    // last chunk per the wire convention: move the temp file into place
    if current_chunk == chunk_count {
        tokio::fs::create_dir_all(&state.config.upload_dir).await?;
        let final_path = state.config.upload_dir.join(&file_name);
        tokio::fs::rename(&temp_path, &final_path).await?;
        info!(
            target: "server::upload",
            file = %file_name,
            sends = chunk_count + 1,
            "Upload completed, file moved into place"
        );
    }

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        ["jpeg", "jpg", "png", "txt"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn accepts_well_formed_names() {
        assert!(is_allowed_name("photo.jpg", &exts()));
        assert!(is_allowed_name("My Holiday (2012).png", &exts()));
        assert!(is_allowed_name("notes_v2.txt", &exts()));
        assert!(is_allowed_name("PHOTO.JPG", &exts()));
    }

    #[test]
    fn rejects_bad_extensions_and_characters() {
        assert!(!is_allowed_name("script.php", &exts()));
        assert!(!is_allowed_name("no_extension", &exts()));
        assert!(!is_allowed_name(".jpg", &exts()));
        assert!(!is_allowed_name("two.dots.jpg", &exts()));
        assert!(!is_allowed_name("../escape.jpg", &exts()));
        assert!(!is_allowed_name("bad/slash.jpg", &exts()));
        assert!(!is_allowed_name("<script>.jpg", &exts()));
    }
}
