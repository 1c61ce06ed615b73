//! トラフィックログの型定義

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 単一値に正規化したヘッダーマップ
///
/// キーは最初に現れた順を保ち、JSONにもその順で書き出す。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSnapshot(Vec<(String, String)>);

impl HeaderSnapshot {
    /// 空のスナップショット
    pub fn new() -> Self {
        Self::default()
    }

    /// キーの値
    pub fn get(&self, key: &str) -> Option<&String> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// キーの値への可変参照
    pub fn get_mut(&mut self, key: &str) -> Option<&mut String> {
        self.0.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// キーが存在するか
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 値を設定する。既存キーは位置を保ったまま置き換える
    pub fn insert(&mut self, key: String, value: String) -> Option<String> {
        match self.get_mut(&key) {
            Some(existing) => Some(std::mem::replace(existing, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    /// キー数
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 挿入順に (キー, 値) を返す
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for HeaderSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut snapshot = Self::new();
        for (key, value) in iter {
            snapshot.insert(key, value);
        }
        snapshot
    }
}

impl<const N: usize> From<[(String, String); N]> for HeaderSnapshot {
    fn from(pairs: [(String, String); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl Serialize for HeaderSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> Visitor<'de> for SnapshotVisitor {
            type Value = HeaderSnapshot;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut snapshot = HeaderSnapshot::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    snapshot.insert(key, value);
                }
                Ok(snapshot)
            }
        }

        deserializer.deserialize_map(SnapshotVisitor)
    }
}

/// ルートパラメータのスナップショット
pub type RouteData = BTreeMap<String, String>;

/// 認証済みアイデンティティ
///
/// ホストの認証レイヤーがリクエストextensionsに挿入する。
/// 存在しない場合は未認証として `user` を記録しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

/// サービングプロセスの静的記述子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// アプリケーション名
    pub application: String,
    /// マシン名
    pub machine: String,
}

impl ProcessInfo {
    /// アプリケーション名を指定し、マシン名はホスト名から解決する
    pub fn detect(application: impl Into<String>) -> Self {
        let machine = sysinfo::System::host_name()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            application: application.into(),
            machine,
        }
    }
}

/// キャプチャに必要なホスト由来の情報
///
/// フレームワークのリクエストオブジェクトへの参照は保持せず、
/// 必要な値だけを所有データとして写し取る。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// 認証済みユーザー名
    pub user: Option<String>,
    /// マッチしたルートテンプレート
    pub route_template: Option<String>,
    /// ルートパラメータ
    pub route_data: Option<RouteData>,
    /// クライアントIPアドレス
    pub client_ip: Option<String>,
}

/// キャプチャしたボディ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedBody {
    /// Content-Type ヘッダー値
    pub content_type: Option<String>,
    /// テキストとして復号できたボディ
    pub text: Option<String>,
}

/// トラフィックログエントリ
///
/// リクエスト側・レスポンス側の両方が揃った完成済みエントリ。
/// 生成後はライターへムーブされ、以降変更されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// 相関ID
    pub reference_id: Uuid,
    /// アプリケーション名
    pub application: String,
    /// マシン名
    pub machine: String,
    /// 認証済みユーザー名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// リクエスト受信時刻
    pub request_timestamp: DateTime<Utc>,
    /// HTTPメソッド
    pub request_method: String,
    /// 絶対URI
    pub request_uri: String,
    /// クライアントIPアドレス
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_ip_address: Option<String>,
    /// リクエストのContent-Type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_content_type: Option<String>,
    /// リクエストボディ（テキスト）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_content_body: Option<String>,
    /// リクエストヘッダー
    #[serde(default)]
    pub request_headers: HeaderSnapshot,
    /// ルートテンプレート
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_route_template: Option<String>,
    /// ルートパラメータ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_route_data: Option<RouteData>,
    /// レスポンス送出時刻
    pub response_timestamp: DateTime<Utc>,
    /// HTTPステータスコード
    pub response_status_code: u16,
    /// レスポンスのContent-Type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_content_type: Option<String>,
    /// レスポンスボディ（テキスト）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_content_body: Option<String>,
    /// レスポンスヘッダー
    #[serde(default)]
    pub response_headers: HeaderSnapshot,
}

/// 永続化結果（終端状態）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// ストアへの書き込み成功
    Persisted,
    /// 書き込み失敗（再送しない）
    Failed,
}

impl PersistOutcome {
    /// 文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PersistOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
