use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::errors::Result;

/// 持续运行的后台工作循环
///
/// 实现者只提供单步on_iteration, 循环体为: 只要未停止就反复执行该步。
/// 基础设施不规定迭代频率, 节奏(睡眠/有界阻塞)由实现者自己掌握;
/// 迭代中抛出的错误也不会被这里捕获, 循环随错误终止, 重启策略属于上层监督者。
#[async_trait]
pub trait BackgroundLoop: Send + Sync + 'static {
    /// 循环名称, 用于日志与句柄标识
    fn name(&self) -> &'static str;

    /// 执行一次迭代
    async fn on_iteration(&self) -> Result<()>;
}

/// 启动一个分离的后台循环, 调用方不会被它拖住
pub fn spawn_loop(process: Arc<dyn BackgroundLoop>) -> LoopHandle {
    let name = process.name();
    let handle = tokio::spawn(async move {
        info!("后台循环 {} 已启动", name);
        loop {
            if let Err(e) = process.on_iteration().await {
                error!("后台循环 {} 因错误终止: {}", name, e);
                return Err(e);
            }
        }
    });
    LoopHandle { name, handle }
}

/// 已启动循环的控制句柄
pub struct LoopHandle {
    name: &'static str,
    handle: JoinHandle<Result<()>>,
}

impl LoopHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 强制终止循环
    ///
    /// 这是硬停止而非协作信号: 不保证当前迭代执行完, 也不冲刷在途状态。
    pub fn stop(&self) {
        self.handle.abort();
        info!("后台循环 {} 已被强制停止", self.name);
    }

    /// 循环是否已经结束(因错误终止或被强制停止)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 等待循环结束; 被强制停止返回None, 因错误终止返回Some(Err)
    pub async fn join(self) -> Option<Result<()>> {
        match self.handle.await {
            Ok(result) => Some(result),
            // 任务被中止
            Err(_) => None,
        }
    }
}
