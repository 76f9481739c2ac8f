//! 有界并发解析器
//!
//! 每个请求创建一个容量为 `concurrency` 的信号量，先取得许可再派发阻塞任务，
//! 因此同时进行中的查询数永远不超过上限，与批量大小无关。
//! 结果按输入下标写回，输出顺序与输入一致。

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, warn};

use crate::errors::{IpsightError, messages};
use crate::geo::{GeoRecord, RecordMerger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// 调用方取消，已运行的查询结束后返回，不返回部分结果
    Cancelled,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Cancelled => f.write_str("resolution cancelled"),
        }
    }
}

impl std::error::Error for ResolveError {}

type TaskOutput = (usize, Option<GeoRecord>);

#[derive(Clone)]
pub struct BoundedResolver {
    merger: RecordMerger,
    concurrency: usize,
}

impl BoundedResolver {
    pub fn new(merger: RecordMerger, concurrency: usize) -> Self {
        Self {
            merger,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn merger(&self) -> &RecordMerger {
        &self.merger
    }

    /// 解析单个地址，无法解析时返回 `InvalidAddress`
    pub async fn resolve_one(&self, raw: &str, lang: &str) -> Result<GeoRecord, IpsightError> {
        if raw.parse::<IpAddr>().is_err() {
            return Err(IpsightError::invalid_address(messages::INVALID_IP));
        }
        let input = [raw.to_string()];
        self.resolve(&input, lang)
            .await
            .pop()
            .ok_or_else(|| IpsightError::service_error("resolver returned no record"))
    }

    /// 解析一批地址，等待全部完成
    ///
    /// 返回值长度与输入一致，`result[i].ip == ips[i]`。
    pub async fn resolve(&self, ips: &[String], lang: &str) -> Vec<GeoRecord> {
        match self
            .resolve_until(ips, lang, std::future::pending::<()>())
            .await
        {
            Ok(records) => records,
            // pending() 永不完成
            Err(ResolveError::Cancelled) => ips
                .iter()
                .map(|ip| GeoRecord::failed(ip.as_str(), messages::LOOKUP_FAILED))
                .collect(),
        }
    }

    /// 可取消的批量解析
    ///
    /// `cancel` 完成后停止派发，中止尚未开始的任务，等待已运行的查询结束后返回
    /// `Err(ResolveError::Cancelled)`。
    pub async fn resolve_until<F>(
        &self,
        ips: &[String],
        lang: &str,
        cancel: F,
    ) -> Result<Vec<GeoRecord>, ResolveError>
    where
        F: Future<Output = ()>,
    {
        if ips.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let mut slots: Vec<Option<GeoRecord>> = vec![None; ips.len()];
        let mut queue = Vec::with_capacity(ips.len());
        for (idx, raw) in ips.iter().enumerate() {
            match raw.parse::<IpAddr>() {
                Ok(ip) => queue.push((idx, ip)),
                Err(_) => {
                    slots[idx] = Some(GeoRecord::failed(raw.as_str(), messages::INVALID_IP));
                }
            }
        }
        let dispatched = queue.len();

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let lang: Arc<str> = Arc::from(lang);
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut task_slots: HashMap<Id, usize> = HashMap::with_capacity(dispatched);
        let mut cancelled = false;

        tokio::pin!(cancel);

        for (idx, ip) in queue {
            let permit = tokio::select! {
                biased;
                _ = &mut cancel => {
                    cancelled = true;
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(p) => p,
                    // 信号量只在本函数内持有，不会被关闭
                    Err(_) => break,
                },
            };

            let merger = self.merger.clone();
            let lang = Arc::clone(&lang);
            let handle = tasks.spawn_blocking(move || {
                let _permit = permit;
                let record = catch_unwind(AssertUnwindSafe(|| merger.merge(ip, &lang))).ok();
                (idx, record)
            });
            task_slots.insert(handle.id(), idx);

            while let Some(joined) = tasks.try_join_next() {
                Self::collect(&mut slots, &task_slots, joined);
            }
        }

        if !cancelled {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel => {
                        cancelled = true;
                        break;
                    }
                    joined = tasks.join_next() => match joined {
                        Some(joined) => Self::collect(&mut slots, &task_slots, joined),
                        None => break,
                    },
                }
            }
        }

        if cancelled {
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            debug!(
                "Resolution of {} address(es) cancelled after {:?}",
                ips.len(),
                started.elapsed()
            );
            return Err(ResolveError::Cancelled);
        }

        let records = slots
            .into_iter()
            .zip(ips)
            .map(|(slot, raw)| {
                let mut record = slot
                    .unwrap_or_else(|| GeoRecord::failed(raw.as_str(), messages::LOOKUP_FAILED));
                record.ip = raw.clone();
                record
            })
            .collect();

        debug!(
            "Resolved {} address(es), {} dispatched, ceiling {}, in {:?}",
            ips.len(),
            dispatched,
            self.concurrency,
            started.elapsed()
        );
        Ok(records)
    }

    fn collect(
        slots: &mut [Option<GeoRecord>],
        task_slots: &HashMap<Id, usize>,
        joined: Result<TaskOutput, JoinError>,
    ) {
        match joined {
            Ok((idx, Some(record))) => slots[idx] = Some(record),
            Ok((idx, None)) => {
                warn!("Lookup worker panicked for input #{}", idx);
            }
            Err(e) => {
                if let Some(&idx) = task_slots.get(&e.id()) {
                    warn!("Lookup worker for input #{} failed: {}", idx, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoSourceChain;

    fn resolver(concurrency: usize) -> BoundedResolver {
        BoundedResolver::new(RecordMerger::new(Arc::new(GeoSourceChain::empty())), concurrency)
    }

    #[tokio::test]
    async fn test_empty_input() {
        assert!(resolver(4).resolve(&[], "en").await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_entries_are_marked_in_place() {
        let ips: Vec<String> = vec![" 1.1.1.1".into(), "1.1.1.1".into(), "".into()];
        let out = resolver(2).resolve(&ips, "en").await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].error.as_deref(), Some(messages::INVALID_IP));
        assert!(out[1].error.is_none());
        assert_eq!(out[2].error.as_deref(), Some(messages::INVALID_IP));
        for (rec, ip) in out.iter().zip(&ips) {
            assert_eq!(&rec.ip, ip);
        }
    }

    #[tokio::test]
    async fn test_resolve_one_rejects_unparsable_address() {
        let err = resolver(1).resolve_one("not-an-ip", "en").await.unwrap_err();
        assert!(matches!(err, IpsightError::InvalidAddress(_)));
        assert_eq!(err.message(), messages::INVALID_IP);
    }

    #[tokio::test]
    async fn test_ipv4_mapped_address_reports_v6() {
        let rec = resolver(1).resolve_one("::ffff:8.8.8.8", "en").await.unwrap();
        assert_eq!(rec.ip, "::ffff:8.8.8.8");
        assert_eq!(rec.network.map(|n| n.ip_version), Some(6));
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        assert_eq!(resolver(0).concurrency(), 1);
    }
}
