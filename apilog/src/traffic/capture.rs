//! ログエントリの組み立て
//!
//! リクエスト側を `PendingEntry` として確定し、レスポンス受信後に
//! `complete` で `LogEntry` へ変換する。各フィールド群は一度だけ設定される。

use crate::common::ip::resolve_client_ip;
use crate::traffic::headers::collapse_header_map;
use crate::traffic::types::{
    CapturedBody, HeaderSnapshot, Identity, LogEntry, ProcessInfo, RequestContext, RouteData,
};
use axum::extract::{ConnectInfo, FromRequestParts, MatchedPath, RawPathParams};
use axum::http::{header, request, HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use uuid::Uuid;

impl RequestContext {
    /// axumのリクエストpartsからコンテキストを写し取る
    ///
    /// ルートにマッチしていない場合、ルートテンプレートとパラメータは設定しない。
    pub async fn from_parts(parts: &mut request::Parts) -> Self {
        let user = parts.extensions.get::<Identity>().map(|id| id.0.clone());
        let route_template = parts
            .extensions
            .get::<MatchedPath>()
            .map(|path| path.as_str().to_string());

        let route_data = if route_template.is_some() {
            RawPathParams::from_request_parts(parts, &())
                .await
                .ok()
                .map(|params| {
                    params
                        .iter()
                        .map(|(key, value)| (key.to_string(), value.to_string()))
                        .collect::<RouteData>()
                })
        } else {
            None
        };

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        let client_ip = resolve_client_ip(&parts.headers, peer.as_ref());

        Self {
            user,
            route_template,
            route_data,
            client_ip,
        }
    }
}

/// リクエスト側のみ確定したエントリ
#[derive(Debug, Clone)]
pub struct PendingEntry {
    reference_id: Uuid,
    application: String,
    machine: String,
    user: Option<String>,
    request_timestamp: DateTime<Utc>,
    request_method: String,
    request_uri: String,
    request_ip_address: Option<String>,
    request_content_type: Option<String>,
    request_content_body: Option<String>,
    request_headers: HeaderSnapshot,
    request_route_template: Option<String>,
    request_route_data: Option<RouteData>,
}

impl PendingEntry {
    /// リクエスト側フィールドを確定する
    pub fn capture(
        reference_id: Uuid,
        process: &ProcessInfo,
        parts: &request::Parts,
        context: &RequestContext,
        body: CapturedBody,
    ) -> Self {
        Self {
            reference_id,
            application: process.application.clone(),
            machine: process.machine.clone(),
            user: context.user.clone(),
            request_timestamp: Utc::now(),
            request_method: parts.method.to_string(),
            request_uri: absolute_uri(parts),
            request_ip_address: context.client_ip.clone(),
            request_content_type: body.content_type,
            request_content_body: body.text,
            request_headers: collapse_header_map(&parts.headers),
            request_route_template: context.route_template.clone(),
            request_route_data: context.route_data.clone(),
        }
    }

    /// レスポンス側フィールドを確定し、完成済みエントリを返す
    ///
    /// ボディがなければコンテンツ系フィールドは設定しない。
    pub fn complete(self, status: StatusCode, headers: &HeaderMap, body: CapturedBody) -> LogEntry {
        // 壁時計が巻き戻っても requestTimestamp 以上を保つ
        let response_timestamp = Utc::now().max(self.request_timestamp);

        LogEntry {
            reference_id: self.reference_id,
            application: self.application,
            machine: self.machine,
            user: self.user,
            request_timestamp: self.request_timestamp,
            request_method: self.request_method,
            request_uri: self.request_uri,
            request_ip_address: self.request_ip_address,
            request_content_type: self.request_content_type,
            request_content_body: self.request_content_body,
            request_headers: self.request_headers,
            request_route_template: self.request_route_template,
            request_route_data: self.request_route_data,
            response_timestamp,
            response_status_code: status.as_u16(),
            response_content_type: body.content_type,
            response_content_body: body.text,
            response_headers: collapse_header_map(headers),
        }
    }
}

/// リクエストURIを絶対URIで返す
///
/// サーバー側のURIは通常パスのみのため、Hostヘッダーとスキームを補う。
fn absolute_uri(parts: &request::Parts) -> String {
    if parts.uri.scheme().is_some() {
        return parts.uri.to_string();
    }

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.authority().map(|a| a.as_str()));

    match host {
        Some(host) => {
            let scheme = parts
                .headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("http");
            format!("{}://{}{}", scheme, host, path_and_query)
        }
        None => path_and_query.to_string(),
    }
}

/// Content-Type ヘッダー値を文字列で取得する
pub fn content_type_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// テキストとして記録できるContent-Typeか判定する
///
/// `text/event-stream` はストリーミングのため対象外。
pub fn is_textual(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if essence == "text/event-stream" {
        return false;
    }
    if essence.starts_with("text/") {
        return true;
    }
    matches!(
        essence.as_str(),
        "application/json"
            | "application/xml"
            | "application/javascript"
            | "application/x-www-form-urlencoded"
            | "application/graphql"
    ) || essence.ends_with("+json")
        || essence.ends_with("+xml")
}
