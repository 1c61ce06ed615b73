//! トラフィックログの非同期ライター
//!
//! 有界mpscチャネルでエントリを受信し、固定数のワーカーがシリアライズと
//! ストアへの書き込みを行う。リクエスト処理側は決して待たされない。
//! キューが満杯の場合は投入しようとしたエントリ（最新）を破棄する。

use crate::common::error::ApiLogError;
use crate::config::get_env_with_fallback_parse;
use crate::db::traits::LogSink;
use crate::shutdown::ShutdownController;
use crate::traffic::serializer::serialize_entry;
use crate::traffic::types::{LogEntry, PersistOutcome};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// ライター設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogWriterConfig {
    /// キュー容量。デフォルト: 10000
    pub queue_capacity: usize,
    /// 書き込みワーカー数。デフォルト: 2
    pub workers: usize,
    /// シャットダウン時のドレイン猶予。デフォルト: 5秒
    pub drain_timeout: Duration,
    /// 1件あたりの書き込みタイムアウト。デフォルト: 10秒
    pub write_timeout: Duration,
}

impl Default for LogWriterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            workers: 2,
            drain_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl LogWriterConfig {
    /// 環境変数から読み込む
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            queue_capacity: get_env_with_fallback_parse(
                "APILOG_QUEUE_CAPACITY",
                "APILOG_BUFFER_CAPACITY",
                defaults.queue_capacity,
            )
            .max(1),
            workers: get_env_with_fallback_parse(
                "APILOG_WORKERS",
                "APILOG_WRITER_WORKERS",
                defaults.workers,
            )
            .max(1),
            drain_timeout: Duration::from_secs(get_env_with_fallback_parse(
                "APILOG_DRAIN_TIMEOUT_SECS",
                "APILOG_SHUTDOWN_TIMEOUT_SECS",
                defaults.drain_timeout.as_secs(),
            )),
            write_timeout: Duration::from_secs(get_env_with_fallback_parse(
                "APILOG_WRITE_TIMEOUT_SECS",
                "APILOG_DB_TIMEOUT_SECS",
                defaults.write_timeout.as_secs(),
            )),
        }
    }
}

/// ライターのカウンター（観測用シンク）
#[derive(Debug, Default)]
pub struct WriterStats {
    persisted: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    discarded: AtomicU64,
}

/// `WriterStats` のある時点の値
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStatsSnapshot {
    /// 書き込み成功件数
    pub persisted: u64,
    /// 書き込み失敗件数
    pub failed: u64,
    /// キュー満杯・停止後で破棄した件数
    pub dropped: u64,
    /// レスポンス前にキャンセルされ破棄した件数
    pub discarded: u64,
}

impl WriterStats {
    /// 現在値を取得
    pub fn snapshot(&self) -> WriterStatsSnapshot {
        WriterStatsSnapshot {
            persisted: self.persisted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    /// キャンセルによる破棄を記録
    pub fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_outcome(&self, outcome: PersistOutcome) {
        match outcome {
            PersistOutcome::Persisted => self.persisted.fetch_add(1, Ordering::Relaxed),
            PersistOutcome::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// トラフィックログの非同期ライター
///
/// Clone可能（senderと共有状態のクローン）。
#[derive(Clone)]
pub struct LogWriter {
    sender: mpsc::Sender<LogEntry>,
    inner: Arc<WriterInner>,
}

struct WriterInner {
    shutdown: ShutdownController,
    workers: Mutex<Vec<JoinHandle<()>>>,
    drain_timeout: Duration,
    stats: Arc<WriterStats>,
}

impl LogWriter {
    /// 新しいLogWriterを作成し、ワーカーを起動
    ///
    /// tokioランタイム内で呼び出す必要がある。
    pub fn new(sink: Arc<dyn LogSink>, config: LogWriterConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(TokioMutex::new(rx));
        let shutdown = ShutdownController::default();
        let stats = Arc::new(WriterStats::default());

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                tokio::spawn(Self::worker(
                    worker_id,
                    rx.clone(),
                    sink.clone(),
                    shutdown.clone(),
                    stats.clone(),
                    config.write_timeout,
                ))
            })
            .collect();

        Self {
            sender: tx,
            inner: Arc::new(WriterInner {
                shutdown,
                workers: Mutex::new(workers),
                drain_timeout: config.drain_timeout,
                stats,
            }),
        }
    }

    /// エントリをキューに投入（ブロックしない）
    ///
    /// キュー満杯・停止後はエントリを破棄して警告を記録する。
    pub fn send(&self, entry: LogEntry) {
        if self.inner.shutdown.is_shutdown_requested() {
            self.inner.stats.record_dropped();
            warn!(
                reference_id = %entry.reference_id,
                "Traffic log writer is shut down, dropping entry"
            );
            return;
        }

        if let Err(e) = self.sender.try_send(entry) {
            self.inner.stats.record_dropped();
            let (reason, entry) = match e {
                mpsc::error::TrySendError::Full(entry) => ("queue full", entry),
                mpsc::error::TrySendError::Closed(entry) => ("queue closed", entry),
            };
            warn!(
                reference_id = %entry.reference_id,
                reason,
                "Failed to enqueue traffic log entry, dropping it"
            );
        }
    }

    /// カウンターへの参照
    pub fn stats(&self) -> &WriterStats {
        &self.inner.stats
    }

    /// 停止し、残りのエントリをドレイン猶予内で書き込む
    ///
    /// 猶予を超えた場合はワーカーを中断し、未処理分は失われる。
    pub async fn shutdown(&self) {
        self.inner.shutdown.request_shutdown();

        let handles: Vec<JoinHandle<()>> = match self.inner.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        if handles.is_empty() {
            return;
        }

        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        match tokio::time::timeout(
            self.inner.drain_timeout,
            futures::future::join_all(handles),
        )
        .await
        {
            Ok(_) => info!(
                stats = ?self.inner.stats.snapshot(),
                "Traffic log writer stopped"
            ),
            Err(_) => {
                for abort in aborts {
                    abort.abort();
                }
                warn!(
                    drain_timeout_secs = self.inner.drain_timeout.as_secs_f64(),
                    "Traffic log drain window elapsed, remaining entries are lost"
                );
            }
        }
    }

    /// 書き込みワーカー
    async fn worker(
        worker_id: usize,
        rx: Arc<TokioMutex<mpsc::Receiver<LogEntry>>>,
        sink: Arc<dyn LogSink>,
        shutdown: ShutdownController,
        stats: Arc<WriterStats>,
        write_timeout: Duration,
    ) {
        debug!(worker_id, "Traffic log worker started");

        loop {
            let next = tokio::select! {
                _ = shutdown.wait() => None,
                entry = async { rx.lock().await.recv().await } => entry,
            };
            match next {
                Some(entry) => {
                    let outcome = persist_entry(sink.as_ref(), entry, write_timeout).await;
                    stats.record_outcome(outcome);
                }
                None => break,
            }
        }

        // 停止要求後はキューに残った分だけを書き込む
        let mut drained = 0usize;
        loop {
            let entry = rx.lock().await.try_recv();
            match entry {
                Ok(entry) => {
                    let outcome = persist_entry(sink.as_ref(), entry, write_timeout).await;
                    stats.record_outcome(outcome);
                    drained += 1;
                }
                Err(_) => break,
            }
        }

        debug!(worker_id, drained, "Traffic log worker stopped");
    }
}

/// 1件をシリアライズして書き込む
///
/// 失敗はログとして報告し、呼び出し元には返さない。再試行はしない。
pub async fn persist_entry(
    sink: &dyn LogSink,
    entry: LogEntry,
    write_timeout: Duration,
) -> PersistOutcome {
    let reference_id = entry.reference_id;
    let content = serialize_entry(&entry);
    drop(entry);

    let result = match tokio::time::timeout(
        write_timeout,
        sink.persist(reference_id, &content, Utc::now()),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(ApiLogError::Timeout(format!(
            "write exceeded {:?}",
            write_timeout
        ))),
    };

    let outcome = match result {
        Ok(()) => PersistOutcome::Persisted,
        Err(e) if e.is_persistence_failure() => {
            warn!(
                reference_id = %reference_id,
                error = %e,
                "Failed to persist traffic log entry"
            );
            PersistOutcome::Failed
        }
        Err(e) => {
            error!(
                reference_id = %reference_id,
                error = %e,
                "Unexpected error while persisting traffic log entry"
            );
            PersistOutcome::Failed
        }
    };
    debug!(reference_id = %reference_id, outcome = %outcome, "Traffic log write finished");
    outcome
}
