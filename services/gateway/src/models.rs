use crate::error::AppError;
use serde::Deserialize;

/// Query string of `GET /api/tokens`.
///
/// `limit` is kept as text so a malformed value becomes a JSON 400 rather
/// than the extractor's plain-text rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokensQuery {
    pub limit: Option<String>,
}

impl TokensQuery {
    /// Parsed limit; absent or blank means the facade default.
    pub fn limit(&self) -> Result<Option<usize>, AppError> {
        match self.limit.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse::<usize>().map(Some).map_err(|_| {
                AppError::BadRequest(format!("limit must be a non-negative integer, got {raw:?}"))
            }),
        }
    }
}
