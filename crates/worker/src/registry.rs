use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::executors::TaskExecutor;

/// 任务注册表
///
/// 任务名到执行器的映射。未注册的任务名在执行侧被视为不可处理,
/// 由调用方决定丢弃还是报错。重复注册同名任务以后者为准。
pub struct TaskRegistry {
    executors: RwLock<HashMap<String, Arc<dyn TaskExecutor>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            executors: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, task_name: impl Into<String>, executor: Arc<dyn TaskExecutor>) {
        let task_name = task_name.into();
        info!("注册任务 {} -> 执行器 {}", task_name, executor.name());

        let mut executors = self.executors.write().await;
        if executors.insert(task_name.clone(), executor).is_some() {
            warn!("任务 {} 已存在, 旧执行器被替换", task_name);
        }
    }

    pub async fn resolve(&self, task_name: &str) -> Option<Arc<dyn TaskExecutor>> {
        self.executors.read().await.get(task_name).cloned()
    }

    pub async fn contains(&self, task_name: &str) -> bool {
        self.executors.read().await.contains_key(task_name)
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.executors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.executors.read().await.is_empty()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
