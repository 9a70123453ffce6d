// cancel.rs - 协作式取消
//! 后台任务在每个文件、每页之间检查取消标记

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// 可克隆的取消令牌，所有克隆共享同一状态
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发出取消请求并唤醒所有等待者
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        let mut cancelled = match lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *cancelled = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (lock, _) = &*self.inner;
        match lock.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// 最多等待 `timeout`，期间被取消则提前返回；返回是否已取消
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut cancelled = match lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            cancelled = match cvar.wait_timeout(cancelled, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *cancelled
    }
}
