//! 请求合并（Batcher）
//!
//! 同一类操作的并发调用被合并为一次网络请求：
//! - 调用方把条目放入待发送数组，等待所在批次完成后返回；
//! - 同一时刻每类操作至多一个批次在途；
//! - 在途期间到达的条目在下一轮一次性发送，直到数组为空才清除在途标记。
//!
//! 发送循环运行在独立任务中，调用方被取消不会使已入队条目丢失。
//!
use evbus_domain::error::{BusError, BusResult};
use futures_util::future::BoxFuture;
use std::mem;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type FlushFn<T> = dyn Fn(Vec<T>) -> BoxFuture<'static, BusResult<()>> + Send + Sync;

struct Waiting<T> {
    item: T,
    done: oneshot::Sender<Result<(), String>>,
}

struct BatchState<T> {
    pending: Vec<Waiting<T>>,
    in_flight: bool,
}

struct Inner<T> {
    name: &'static str,
    flush: Box<FlushFn<T>>,
    state: Mutex<BatchState<T>>,
}

pub struct Batcher<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Batcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> Batcher<T> {
    pub fn new<F>(name: &'static str, flush: F) -> Self
    where
        F: Fn(Vec<T>) -> BoxFuture<'static, BusResult<()>> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                name,
                flush: Box::new(flush),
                state: Mutex::new(BatchState {
                    pending: Vec::new(),
                    in_flight: false,
                }),
            }),
        }
    }

    /// 入队并等待所在批次发送完成
    pub async fn submit(&self, item: T) -> BusResult<()> {
        let (done, outcome) = oneshot::channel();

        let start_drain = {
            let mut state = self.lock()?;
            state.pending.push(Waiting { item, done });
            !mem::replace(&mut state.in_flight, true)
        };

        if start_drain {
            tokio::spawn(Self::drain(self.inner.clone()));
        }

        match outcome.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(BusError::store(reason)),
            Err(_) => Err(BusError::store(format!(
                "{} batch dropped before completion",
                self.inner.name
            ))),
        }
    }

    /// 当前等待发送的条目数
    pub fn pending(&self) -> usize {
        self.inner
            .state
            .lock()
            .map(|state| state.pending.len())
            .unwrap_or_default()
    }

    fn lock(&self) -> BusResult<std::sync::MutexGuard<'_, BatchState<T>>> {
        self.inner
            .state
            .lock()
            .map_err(|_| BusError::store(format!("{} batch state poisoned", self.inner.name)))
    }

    async fn drain(inner: Arc<Inner<T>>) {
        loop {
            let batch = {
                let Ok(mut state) = inner.state.lock() else {
                    tracing::error!(batch = inner.name, "batch state poisoned");
                    return;
                };
                if state.pending.is_empty() {
                    state.in_flight = false;
                    return;
                }
                mem::take(&mut state.pending)
            };

            let size = batch.len();
            let (items, waiters): (Vec<T>, Vec<_>) =
                batch.into_iter().map(|w| (w.item, w.done)).unzip();

            let outcome = (inner.flush)(items).await;
            match &outcome {
                Ok(()) => tracing::debug!(batch = inner.name, size, "batch flushed"),
                Err(error) => tracing::error!(batch = inner.name, size, %error, "batch flush failed"),
            }

            let outcome = outcome.map_err(|e| e.to_string());
            for done in waiters {
                // 调用方可能已放弃等待
                let _ = done.send(outcome.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn recording(calls: Arc<Mutex<Vec<Vec<u32>>>>, fail: Arc<AtomicBool>) -> Batcher<u32> {
        Batcher::new("test", move |items: Vec<u32>| {
            let calls = calls.clone();
            let fail = fail.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                calls.lock().unwrap().push(items);
                if fail.load(Ordering::SeqCst) {
                    Err(BusError::transport("boom"))
                } else {
                    Ok(())
                }
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn items_queued_during_a_flush_go_out_together() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let batcher = recording(calls.clone(), Arc::new(AtomicBool::new(false)));

        let first = tokio::spawn({
            let b = batcher.clone();
            async move { b.submit(1).await }
        });
        // 等第一批进入发送
        tokio::time::sleep(Duration::from_millis(10)).await;

        let rest = futures_util::future::join_all((2..=4).map(|i| {
            let b = batcher.clone();
            async move { b.submit(i).await }
        }));

        let (first, rest) = tokio::join!(first, rest);
        first.unwrap().unwrap();
        assert!(rest.iter().all(|r| r.is_ok()));

        assert_eq!(*calls.lock().unwrap(), vec![vec![1], vec![2, 3, 4]]);
        assert_eq!(batcher.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_errors_reach_every_waiter() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let batcher = recording(calls.clone(), Arc::new(AtomicBool::new(true)));

        let results = futures_util::future::join_all((1..=3).map(|i| {
            let b = batcher.clone();
            async move { b.submit(i).await }
        }))
        .await;

        assert!(results.iter().all(|r| matches!(r, Err(BusError::Store { .. }))));
        let flushed: Vec<u32> = calls.lock().unwrap().concat();
        assert_eq!(flushed, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn batcher_recovers_after_a_failed_round() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let fail = Arc::new(AtomicBool::new(true));
        let batcher = recording(calls.clone(), fail.clone());

        assert!(batcher.submit(1).await.is_err());
        fail.store(false, Ordering::SeqCst);
        batcher.submit(2).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![vec![1], vec![2]]);
    }
}
