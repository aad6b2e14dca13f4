use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// 客户端限时封禁表
///
/// 仅用于减少对远程决策服务的重复调用，只会短路为拒绝，不会产生放行。
/// 过期条目在下一次读取时惰性删除，没有后台清理任务。
#[derive(Debug)]
pub struct ClientBlockList {
    duration: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl ClientBlockList {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// 查询客户端是否处于封禁窗口内，过期条目在返回前移除
    pub async fn is_blocked(&self, client_id: &str) -> bool {
        let mut guard = self.entries.lock().await;
        match guard.get(client_id) {
            Some(expiry) if Instant::now() < *expiry => true,
            Some(_) => {
                guard.remove(client_id);
                false
            }
            None => false,
        }
    }

    /// 记录封禁，重复封禁覆盖之前的过期时间
    pub async fn block(&self, client_id: &str) -> Instant {
        let expiry = Instant::now() + self.duration;
        self.entries
            .lock()
            .await
            .insert(client_id.to_string(), expiry);
        expiry
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
