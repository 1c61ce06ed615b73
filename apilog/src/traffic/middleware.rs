//! トラフィックログミドルウェア
//!
//! 全HTTPリクエストについて、リクエスト・レスポンスの内容を相関IDつきで
//! 記録する。呼び出し元へ返すレスポンスは一切変更しない。

use crate::common::error::ApiLogError;
use crate::config::CaptureConfig;
use crate::traffic::capture::{content_type_of, is_textual, PendingEntry};
use crate::traffic::types::{CapturedBody, ProcessInfo, RequestContext};
use crate::traffic::writer::LogWriter;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use futures::stream::{self, StreamExt};
use http_body::Body as _;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

/// ミドルウェアの状態
///
/// `axum::middleware::from_fn_with_state` に渡して使う。
#[derive(Clone)]
pub struct TrafficLogger {
    writer: LogWriter,
    config: Arc<CaptureConfig>,
    process: Arc<ProcessInfo>,
}

impl TrafficLogger {
    /// マシン名をホスト名から解決して作成
    pub fn new(writer: LogWriter, config: CaptureConfig) -> Self {
        let process = ProcessInfo::detect(config.application.clone());
        Self::with_process(writer, config, process)
    }

    /// プロセス記述子を明示して作成
    pub fn with_process(writer: LogWriter, config: CaptureConfig, process: ProcessInfo) -> Self {
        Self {
            writer,
            config: Arc::new(config),
            process: Arc::new(process),
        }
    }

    /// ライターへの参照
    pub fn writer(&self) -> &LogWriter {
        &self.writer
    }
}

/// トラフィックログミドルウェア
///
/// リクエストボディはバッファして同一バイト列で下流へ渡し、レスポンスは
/// 条件を満たす場合のみバッファして同一バイト列で返す。完成したエントリは
/// ブロックせずにライターへ投入する。
pub async fn traffic_log_middleware(
    State(logger): State<TrafficLogger>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if logger.config.should_exclude(request.uri().path()) {
        return next.run(request).await;
    }

    let reference_id = Uuid::new_v4();
    let max_body_bytes = logger.config.max_body_bytes;

    let (mut parts, body) = request.into_parts();
    let context = RequestContext::from_parts(&mut parts).await;
    let (body, request_body) = capture_request_body(&parts.headers, body, max_body_bytes).await;
    let pending = PendingEntry::capture(
        reference_id,
        &logger.process,
        &parts,
        &context,
        request_body,
    );

    let mut guard = DiscardGuard::new(reference_id, logger.writer.clone());

    let response = next.run(Request::from_parts(parts, body)).await;

    let (parts, body) = response.into_parts();
    let (body, response_body) = capture_response_body(&parts.headers, body, max_body_bytes).await;
    guard.disarm();

    let entry = pending.complete(parts.status, &parts.headers, response_body);
    trace!(
        reference_id = %reference_id,
        method = %entry.request_method,
        status = entry.response_status_code,
        "traffic log entry captured"
    );
    logger.writer.send(entry);

    Response::from_parts(parts, body)
}

/// リクエストボディを非破壊でキャプチャする
///
/// 戻り値のボディは下流に渡すもの。読み取りに失敗した場合は同じエラーを
/// 返すボディを渡し、キャプチャ結果のテキストは設定しない。
async fn capture_request_body(
    headers: &HeaderMap,
    body: Body,
    max_body_bytes: usize,
) -> (Body, CapturedBody) {
    let content_type = content_type_of(headers);

    if !content_type.as_deref().map_or(true, is_textual) {
        return (
            body,
            CapturedBody {
                content_type,
                text: None,
            },
        );
    }
    if body.size_hint().lower() > max_body_bytes as u64 {
        debug!(
            declared = body.size_hint().lower(),
            max_body_bytes, "Request body exceeds capture limit, passing through"
        );
        return (
            body,
            CapturedBody {
                content_type,
                text: None,
            },
        );
    }

    match read_bounded(body, max_body_bytes).await {
        BoundedRead::Complete(bytes) => {
            let text = decode_text(&bytes, "request");
            (Body::from(bytes), CapturedBody { content_type, text })
        }
        BoundedRead::Overflow(body) => {
            debug!(max_body_bytes, "Request body exceeds capture limit, passing through");
            (
                body,
                CapturedBody {
                    content_type,
                    text: None,
                },
            )
        }
        BoundedRead::Failed(body, e) => {
            let err = ApiLogError::Capture(format!("request body unreadable: {}", e));
            debug!(error = %err, "Omitting request body");
            (
                body,
                CapturedBody {
                    content_type,
                    text: None,
                },
            )
        }
    }
}

/// レスポンスボディをキャプチャする
///
/// 長さが不明なストリーミングや上限を超えるボディはバッファせずそのまま返す。
/// 上限の宣言が実際の長さと食い違っても上限を超えては読まない。
async fn capture_response_body(
    headers: &HeaderMap,
    body: Body,
    max_body_bytes: usize,
) -> (Body, CapturedBody) {
    let hint = body.size_hint();
    if hint.exact() == Some(0) {
        return (body, CapturedBody::default());
    }

    let content_type = content_type_of(headers);
    let textual = content_type.as_deref().map_or(true, is_textual);
    let bounded = matches!(hint.upper(), Some(upper) if upper <= max_body_bytes as u64);
    if !textual || !bounded {
        return (
            body,
            CapturedBody {
                content_type,
                text: None,
            },
        );
    }

    match read_bounded(body, max_body_bytes).await {
        BoundedRead::Complete(bytes) => {
            let text = decode_text(&bytes, "response");
            (Body::from(bytes), CapturedBody { content_type, text })
        }
        BoundedRead::Overflow(body) => (
            body,
            CapturedBody {
                content_type,
                text: None,
            },
        ),
        BoundedRead::Failed(body, e) => {
            let err = ApiLogError::Capture(format!("response body unreadable: {}", e));
            debug!(error = %err, "Omitting response body");
            (
                body,
                CapturedBody {
                    content_type,
                    text: None,
                },
            )
        }
    }
}

/// 上限つきで読み取ったボディ
enum BoundedRead {
    /// 上限以内で最後まで読めた
    Complete(Bytes),
    /// 上限を超えた。読んだ分と残りのストリームをつないだボディ
    Overflow(Body),
    /// 読み取りエラー。読んだ分の後に同じエラーを返すボディ
    Failed(Body, String),
}

/// ボディを最大 `limit + 1` バイトまで読む
///
/// 宣言長のないストリームでも上限を超えた時点で読み取りをやめ、
/// 下流には元と同じバイト列が届くボディを返す。
async fn read_bounded(body: Body, limit: usize) -> BoundedRead {
    let mut frames = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut total = 0usize;

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(chunk) => {
                total += chunk.len();
                chunks.push(chunk);
                if total > limit {
                    let prefix = stream::iter(chunks.into_iter().map(Ok::<Bytes, axum::Error>));
                    return BoundedRead::Overflow(Body::from_stream(prefix.chain(frames)));
                }
            }
            Err(e) => {
                let message = e.to_string();
                let replay = chunks
                    .into_iter()
                    .map(Ok::<Bytes, axum::Error>)
                    .chain(std::iter::once(Err(e)));
                return BoundedRead::Failed(Body::from_stream(stream::iter(replay)), message);
            }
        }
    }

    BoundedRead::Complete(Bytes::from(chunks.concat()))
}

fn decode_text(bytes: &Bytes, side: &'static str) -> Option<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.to_string()),
        Err(e) => {
            let err = ApiLogError::Capture(format!("{} body is not valid UTF-8: {}", side, e));
            debug!(error = %err, "Omitting body content");
            None
        }
    }
}

/// 下流ハンドラーが戻る前に破棄されたリクエストを記録する
struct DiscardGuard {
    reference_id: Uuid,
    writer: LogWriter,
    armed: bool,
}

impl DiscardGuard {
    fn new(reference_id: Uuid, writer: LogWriter) -> Self {
        Self {
            reference_id,
            writer,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for DiscardGuard {
    fn drop(&mut self) {
        if self.armed {
            self.writer.stats().record_discarded();
            debug!(
                reference_id = %self.reference_id,
                "Request canceled before response, discarding traffic log entry"
            );
        }
    }
}
