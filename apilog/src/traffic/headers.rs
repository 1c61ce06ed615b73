//! ヘッダー正規化
//!
//! 複数値ヘッダーを単一文字列のマップに畳み込む純粋関数。

use crate::traffic::types::HeaderSnapshot;
use axum::http::HeaderMap;
use tracing::debug;

/// (キー, 値リスト) の並びを単一値マップに畳み込む
///
/// - 値リストが空のキーは出力から除外する
/// - 値は元の順序のまま半角スペース1つで連結し、末尾の空白を除去する
/// - 同じキーが複数回現れた場合は後続の値を追記する
pub fn collapse<I, K, V, S>(pairs: I) -> HeaderSnapshot
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut collapsed = HeaderSnapshot::new();
    for (key, values) in pairs {
        let mut joined = String::new();
        let mut any = false;
        for value in values {
            if any {
                joined.push(' ');
            }
            joined.push_str(value.as_ref());
            any = true;
        }
        if !any {
            continue;
        }

        let key = key.into();
        let joined = joined.trim_end().to_string();
        match collapsed.get_mut(&key) {
            Some(existing) => {
                if !joined.is_empty() {
                    if !existing.is_empty() {
                        existing.push(' ');
                    }
                    existing.push_str(&joined);
                }
            }
            None => {
                collapsed.insert(key, joined);
            }
        }
    }
    collapsed
}

/// HTTPヘッダーマップを単一値マップに畳み込む
///
/// 可視ASCIIとして読めない値はスキップする。
pub fn collapse_header_map(headers: &HeaderMap) -> HeaderSnapshot {
    collapse(headers.keys().map(|name| {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|value| match value.to_str() {
                Ok(text) => Some(text),
                Err(_) => {
                    debug!(header = %name, "Skipping non-text header value");
                    None
                }
            })
            .collect();
        (name.as_str().to_string(), values)
    }))
}
