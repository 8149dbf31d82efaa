use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::error::{CrawlError, Result};

/// 固定容量的任务池，克隆后共享同一组许可
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn task_manager<R: Send + 'static>(&self) -> TaskManager<R> {
        TaskManager {
            pool: self.clone(),
            tasks: JoinSet::new(),
        }
    }
}

// 任务一提交就开始排队等许可，wait 只负责收集结果
pub struct TaskManager<R: Send + 'static> {
    pool: WorkerPool,
    tasks: JoinSet<Result<R>>,
}

impl<R: Send + 'static> TaskManager<R> {
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = Result<R>> + Send + 'static,
    {
        let permits = Arc::clone(&self.pool.permits);
        self.tasks.spawn(async move {
            let _permit = permits.acquire_owned().await?;
            future.await
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 等待全部任务结束，不会提前取消
    ///
    /// 有任务失败时返回最先收到的错误，其余错误只记录日志。
    pub async fn wait(&mut self) -> Result<Vec<R>> {
        let mut results = Vec::new();
        let mut first_error: Option<CrawlError> = None;

        while let Some(joined) = self.tasks.join_next().await {
            match joined.map_err(CrawlError::from).and_then(|result| result) {
                Ok(value) => results.push(value),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => warn!("另一个任务也失败了: {}", e),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}
