use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, info};

use conveyor_core::{
    spawn_loop, AppConfig, HoldQueue, LoopHandle, ReadyQueue, SignalHub, Transport, WorkQueue,
};
use conveyor_dispatcher::{DelayedTaskController, Mediator, PeriodicTaskRegistry};
use conveyor_infrastructure::{TaskConsumer, TaskPublisher, TransportFactory};
use conveyor_worker::{HttpExecutor, ShellExecutor, TaskPool, TaskRegistry};

/// 主应用程序
///
/// 持有传输层连接和任务注册表, run把三个后台循环拉起来:
/// 消费者把消息从broker搬进内部队列, 中介把就绪任务交给执行池,
/// 控制器晋升到期任务并触发周期任务。
pub struct Application {
    config: AppConfig,
    transport: Arc<dyn Transport>,
    signals: SignalHub,
    publisher: Arc<TaskPublisher>,
    registry: Arc<TaskRegistry>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let transport = TransportFactory::create(&config.transport)
            .await
            .context("创建传输层失败")?;

        let signals = SignalHub::default();
        let publisher = Arc::new(TaskPublisher::new(transport.clone(), signals.clone()));

        // 内置执行器按约定名注册, 部署方通过kwargs描述实际动作
        let registry = Arc::new(TaskRegistry::new());
        registry.register("shell", Arc::new(ShellExecutor::new())).await;
        registry.register("http", Arc::new(HttpExecutor::new())).await;

        Ok(Self {
            config,
            transport,
            signals,
            publisher,
            registry,
        })
    }

    /// 运行应用程序, 直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let worker_identity = self.worker_identity();
        info!("启动工作节点: {}", worker_identity);

        // 发送通知只记日志, 丢了也无妨
        let mut task_sent_rx = self.signals.subscribe_task_sent();
        let signal_logger = tokio::spawn(async move {
            while let Ok(event) = task_sent_rx.recv().await {
                debug!("任务已发送: {}[{}]", event.task_name, event.task_id);
            }
        });

        let ready: Arc<ReadyQueue> = Arc::new(WorkQueue::new("ready"));
        let hold: Arc<HoldQueue> = Arc::new(WorkQueue::new("hold"));

        let pool = Arc::new(TaskPool::new(
            Arc::clone(&self.registry),
            self.config.worker.max_concurrent_tasks,
        ));

        let consumer = TaskConsumer::new(
            Arc::clone(&self.transport),
            Arc::clone(&ready),
            Arc::clone(&hold),
            self.config.transport.consumer_idle_wait(),
        );

        let mediator = Mediator::new(
            Arc::clone(&ready),
            pool,
            self.config.mediator.dequeue_wait(),
        );

        let periodic = Arc::new(
            PeriodicTaskRegistry::from_config(
                &self.config.periodic_tasks,
                Arc::clone(&self.publisher),
            )
            .context("加载周期任务定义失败")?,
        );

        let controller = DelayedTaskController::new(
            Arc::clone(&ready),
            Arc::clone(&hold),
            periodic,
            self.config.controller.pacing_interval(),
        );

        let handles: Vec<LoopHandle> = vec![
            spawn_loop(Arc::new(consumer)),
            spawn_loop(Arc::new(mediator)),
            spawn_loop(Arc::new(controller)),
        ];
        info!(
            "工作节点 {} 已就绪, {} 个后台循环运行中",
            worker_identity,
            handles.len()
        );

        let _ = shutdown_rx.recv().await;
        info!("收到关闭信号, 停止所有后台循环");

        for handle in &handles {
            handle.stop();
        }
        signal_logger.abort();

        info!("工作节点 {} 已停止", worker_identity);
        Ok(())
    }

    /// 工作节点标识: 配置名@主机名
    fn worker_identity(&self) -> String {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        format!("{}@{}", self.config.worker.worker_name, host)
    }
}
