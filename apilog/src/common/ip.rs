//! クライアントIPアドレス解決ユーティリティ
//!
//! プロキシヘッダーを優先し、なければ接続元アドレスを使う。
//! IPv4-mapped IPv6アドレスはIPv4に正規化する。

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// IPアドレスを正規化する
///
/// IPv4-mapped IPv6（::ffff:x.x.x.x）をIPv4に変換。
/// それ以外はそのまま返す。
pub fn normalize_ip(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                IpAddr::V4(v4)
            } else {
                IpAddr::V6(v6)
            }
        }
        v4 => v4,
    }
}

/// SocketAddrからIPアドレスを抽出し正規化する
pub fn normalize_socket_ip(addr: &SocketAddr) -> IpAddr {
    normalize_ip(addr.ip())
}

/// リクエストのクライアントIPを文字列で解決する
///
/// `x-forwarded-for` の先頭要素 → `x-real-ip` → 接続元アドレスの順に参照する。
/// ヘッダー値がIPとして解釈できればIPv4-mappedを正規化し、
/// 解釈できない値はトリムしてそのまま返す。
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<&SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .filter(|s| !s.is_empty());

    if let Some(value) = forwarded {
        return Some(match value.parse::<IpAddr>() {
            Ok(ip) => normalize_ip(ip).to_string(),
            Err(_) => value,
        });
    }

    peer.map(|addr| normalize_socket_ip(addr).to_string())
}
