use crate::{APP_USER_AGENT, GIT_COMMIT_HASH};
use axum::response::IntoResponse;

// axum handler for /
pub async fn root() -> impl IntoResponse {
    format!("{APP_USER_AGENT} - {GIT_COMMIT_HASH}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn root_banner_names_the_service() {
        let response = root().await.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let body = String::from_utf8_lossy(&bytes);
        assert!(body.starts_with(APP_USER_AGENT));
    }
}
