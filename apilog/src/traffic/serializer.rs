//! ログエントリのシリアライズ
//!
//! 完成済みエントリをJSON文書に変換する。文書全体の変換に失敗した場合は
//! フィールド単位で変換し、失敗したフィールドだけをプレースホルダーに置き換える。

use crate::common::error::ApiLogResult;
use crate::traffic::types::LogEntry;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// 変換に失敗したフィールドの代替値
pub const PLACEHOLDER: &str = "<unserializable>";

/// エントリをJSON文字列に変換する（失敗しない）
pub fn serialize_entry(entry: &LogEntry) -> String {
    match serde_json::to_string(entry) {
        Ok(json) => json,
        Err(e) => {
            warn!(
                reference_id = %entry.reference_id,
                error = %e,
                "Failed to serialize log entry as a whole, falling back to per-field serialization"
            );
            serialize_fieldwise(entry)
        }
    }
}

/// JSON文字列からエントリを復元する
pub fn parse_entry(content: &str) -> ApiLogResult<LogEntry> {
    Ok(serde_json::from_str(content)?)
}

/// フィールド単位でJSON文書を組み立てる
fn serialize_fieldwise(entry: &LogEntry) -> String {
    let mut doc = Map::new();
    put(&mut doc, "referenceId", &entry.reference_id);
    put(&mut doc, "application", &entry.application);
    put(&mut doc, "machine", &entry.machine);
    put_opt(&mut doc, "user", &entry.user);
    put(&mut doc, "requestTimestamp", &entry.request_timestamp);
    put(&mut doc, "requestMethod", &entry.request_method);
    put(&mut doc, "requestUri", &entry.request_uri);
    put_opt(&mut doc, "requestIpAddress", &entry.request_ip_address);
    put_opt(&mut doc, "requestContentType", &entry.request_content_type);
    put_opt(&mut doc, "requestContentBody", &entry.request_content_body);
    put(&mut doc, "requestHeaders", &entry.request_headers);
    put_opt(&mut doc, "requestRouteTemplate", &entry.request_route_template);
    put_opt(&mut doc, "requestRouteData", &entry.request_route_data);
    put(&mut doc, "responseTimestamp", &entry.response_timestamp);
    put(&mut doc, "responseStatusCode", &entry.response_status_code);
    put_opt(&mut doc, "responseContentType", &entry.response_content_type);
    put_opt(&mut doc, "responseContentBody", &entry.response_content_body);
    put(&mut doc, "responseHeaders", &entry.response_headers);
    Value::Object(doc).to_string()
}

fn put<T: Serialize + ?Sized>(doc: &mut Map<String, Value>, key: &str, value: &T) {
    let value = serde_json::to_value(value).unwrap_or_else(|e| {
        warn!(field = key, error = %e, "Substituting placeholder for unserializable field");
        Value::String(PLACEHOLDER.to_string())
    });
    doc.insert(key.to_string(), value);
}

fn put_opt<T: Serialize>(doc: &mut Map<String, Value>, key: &str, value: &Option<T>) {
    if let Some(value) = value {
        put(doc, key, value);
    }
}
