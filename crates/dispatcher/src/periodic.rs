use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use conveyor_core::{ConveyorError, PeriodicBackend, PeriodicTaskDef, Result};
use conveyor_infrastructure::{PublishOptions, TaskPublisher};

/// 周期任务的触发计划
pub enum TriggerSchedule {
    /// 固定间隔触发
    Every(Duration),
    /// CRON表达式触发
    Cron(Box<Schedule>),
}

impl TriggerSchedule {
    pub fn every_seconds(seconds: u64) -> Self {
        TriggerSchedule::Every(Duration::seconds(seconds as i64))
    }

    pub fn cron(expr: &str) -> Result<Self> {
        let schedule = Schedule::from_str(expr).map_err(|e| ConveyorError::InvalidSchedule {
            expr: expr.to_string(),
            message: e.to_string(),
        })?;
        Ok(TriggerSchedule::Cron(Box::new(schedule)))
    }

    /// 检查给定时间是否应该触发任务
    pub fn is_due(&self, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self {
            TriggerSchedule::Every(interval) => match last_run {
                // 从未执行过的间隔任务立即到期
                None => true,
                Some(last) => now - last >= *interval,
            },
            TriggerSchedule::Cron(schedule) => match last_run {
                Some(last) => {
                    // 从上次执行时间之后开始查找下一次执行时间
                    if let Some(next_time) = schedule.after(&last).next() {
                        next_time <= now
                    } else {
                        warn!(
                            "无法计算下一次执行时间, 上次执行时间: {}",
                            last.format("%Y-%m-%d %H:%M:%S UTC")
                        );
                        false
                    }
                }
                None => {
                    // 从未执行过, 从一分钟前查起看是否已有执行点落在当前之前
                    let check_from = now - Duration::minutes(1);
                    if let Some(next_time) = schedule.after(&check_from).next() {
                        next_time <= now
                    } else {
                        warn!("无法计算首次执行时间");
                        false
                    }
                }
            },
        }
    }

    /// 获取下一次触发时间
    pub fn next_trigger_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TriggerSchedule::Every(interval) => Some(from + *interval),
            TriggerSchedule::Cron(schedule) => schedule.after(&from).next(),
        }
    }
}

/// 注册表中的一条周期任务
pub struct PeriodicEntry {
    pub task_name: String,
    pub args: Vec<serde_json::Value>,
    pub kwargs: serde_json::Map<String, serde_json::Value>,
    pub schedule: TriggerSchedule,
    pub last_run: Option<DateTime<Utc>>,
}

impl PeriodicEntry {
    pub fn new(task_name: impl Into<String>, schedule: TriggerSchedule) -> Self {
        Self {
            task_name: task_name.into(),
            args: Vec::new(),
            kwargs: serde_json::Map::new(),
            schedule,
            last_run: None,
        }
    }

    pub fn with_args(mut self, args: Vec<serde_json::Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: serde_json::Map<String, serde_json::Value>) -> Self {
        self.kwargs = kwargs;
        self
    }
}

/// 周期任务注册表
///
/// 控制器每次迭代调用run_due_periodic_tasks, 把到期的条目作为普通
/// 任务发布出去, 之后盖上执行时间戳。发布失败立即向上抛, 未发布
/// 成功的条目不盖时间戳, 下一轮还会重试到。
pub struct PeriodicTaskRegistry {
    entries: RwLock<Vec<PeriodicEntry>>,
    publisher: Arc<TaskPublisher>,
}

impl PeriodicTaskRegistry {
    pub fn new(publisher: Arc<TaskPublisher>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            publisher,
        }
    }

    /// 从配置里的周期任务定义构建注册表
    pub fn from_config(defs: &[PeriodicTaskDef], publisher: Arc<TaskPublisher>) -> Result<Self> {
        let mut entries = Vec::with_capacity(defs.len());
        for def in defs {
            def.validate()?;
            let schedule = match (&def.every_seconds, &def.cron) {
                (Some(seconds), None) => TriggerSchedule::every_seconds(*seconds),
                (None, Some(expr)) => TriggerSchedule::cron(expr)?,
                // validate已排除其余组合
                _ => unreachable!(),
            };
            entries.push(PeriodicEntry::new(def.task.clone(), schedule));
        }

        info!("周期任务注册表加载了 {} 个条目", entries.len());
        Ok(Self {
            entries: RwLock::new(entries),
            publisher,
        })
    }

    pub async fn register(&self, entry: PeriodicEntry) {
        info!("注册周期任务: {}", entry.task_name);
        self.entries.write().await.push(entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl PeriodicBackend for PeriodicTaskRegistry {
    async fn run_due_periodic_tasks(&self) -> Result<()> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;

        for entry in entries.iter_mut() {
            if !entry.schedule.is_due(entry.last_run, now) {
                continue;
            }

            debug!("周期任务 {} 到期, 发布执行", entry.task_name);
            self.publisher
                .delay_task(
                    &entry.task_name,
                    entry.args.clone(),
                    entry.kwargs.clone(),
                    &PublishOptions::default(),
                )
                .await?;
            entry.last_run = Some(now);
        }
        Ok(())
    }
}
