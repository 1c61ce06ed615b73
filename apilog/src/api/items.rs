//! サンプルリソースAPI

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// アイテム
#[derive(Debug, Serialize)]
pub struct Item {
    /// ID
    pub id: u64,
    /// 表示名
    pub name: String,
}

/// POST /api/echo
///
/// 受け取ったボディをContent-Typeごとそのまま返す。
pub async fn echo(headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| header::HeaderValue::from_static("application/octet-stream"));
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// GET /api/items/:id
pub async fn get_item(Path(id): Path<u64>) -> Response {
    if id == 0 {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("item {} not found", id),
            })),
        )
            .into_response();
    }

    Json(Item {
        id,
        name: format!("item-{}", id),
    })
    .into_response()
}
