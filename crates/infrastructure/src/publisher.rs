use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use tracing::debug;

use conveyor_core::{
    generate_task_id, ConveyorError, Result, SendOptions, SignalHub, TaskMessage, Transport,
};

/// 发布选项: 消息级字段加传输级透传选项
///
/// countdown是相对延迟(秒), 在发布时换算成绝对eta; 显式eta优先。
/// task_id缺省时自动生成, 重试方可借它复用原标识。
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub task_id: Option<String>,
    pub eta: Option<DateTime<Utc>>,
    pub countdown: Option<u64>,
    pub retries: Option<i32>,
    pub send: SendOptions,
}

/// 任务发布器
///
/// 构造信封并交给传输层; 发布失败原样抛给调用方, 本层不做重试。
/// 每次成功发布都尽力广播一次task_sent通知, 通知不阻塞也不影响发布结果。
pub struct TaskPublisher {
    transport: Arc<dyn Transport>,
    signals: SignalHub,
}

impl TaskPublisher {
    pub fn new(transport: Arc<dyn Transport>, signals: SignalHub) -> Self {
        Self { transport, signals }
    }

    /// 发布一个独立任务, 返回其task_id
    pub async fn delay_task(
        &self,
        task_name: &str,
        args: Vec<serde_json::Value>,
        kwargs: serde_json::Map<String, serde_json::Value>,
        options: &PublishOptions,
    ) -> Result<String> {
        self.publish(task_name, args, kwargs, None, options).await
    }

    /// 以任务集成员身份发布任务, 返回其task_id
    pub async fn delay_task_in_set(
        &self,
        taskset_id: &str,
        task_name: &str,
        args: Vec<serde_json::Value>,
        kwargs: serde_json::Map<String, serde_json::Value>,
        options: &PublishOptions,
    ) -> Result<String> {
        self.publish(task_name, args, kwargs, Some(taskset_id), options)
            .await
    }

    async fn publish(
        &self,
        task_name: &str,
        args: Vec<serde_json::Value>,
        kwargs: serde_json::Map<String, serde_json::Value>,
        taskset_id: Option<&str>,
        options: &PublishOptions,
    ) -> Result<String> {
        if task_name.is_empty() {
            return Err(ConveyorError::InvalidTaskParams(
                "任务名不能为空".to_string(),
            ));
        }

        let task_id = options.task_id.clone().unwrap_or_else(generate_task_id);
        let eta = match options.eta {
            Some(eta) => Some(eta),
            None => options
                .countdown
                .map(|seconds| Utc::now() + Duration::seconds(seconds as i64)),
        };

        let message = TaskMessage {
            task_name: task_name.to_string(),
            task_id: task_id.clone(),
            args,
            kwargs,
            retries: options.retries.unwrap_or(0),
            eta,
            taskset_id: taskset_id.map(|s| s.to_string()),
        };

        self.transport.send(&message, &options.send).await?;
        counter!("conveyor.tasks_published").increment(1);

        // 尽力而为的发送通知, 不重试不阻塞
        self.signals.emit_task_sent(&message);

        debug!(
            "任务 {}[{}] 已发布, eta={:?}, taskset={:?}",
            task_name, task_id, message.eta, message.taskset_id
        );
        Ok(task_id)
    }
}

/// 一组同名任务的批量提交
///
/// 所有成员共享一个生成的taskset_id, 各自拿到独立的task_id。
pub struct TaskSet {
    task_name: String,
    parts: Vec<(Vec<serde_json::Value>, serde_json::Map<String, serde_json::Value>)>,
}

/// 任务集提交结果
#[derive(Debug, Clone)]
pub struct TaskSetResult {
    pub taskset_id: String,
    pub task_ids: Vec<String>,
}

impl TaskSet {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            parts: Vec::new(),
        }
    }

    pub fn add_part(
        mut self,
        args: Vec<serde_json::Value>,
        kwargs: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.parts.push((args, kwargs));
        self
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// 逐个发布所有成员; 任何一次发布失败都立即中止并抛出
    pub async fn run(
        &self,
        publisher: &TaskPublisher,
        options: &PublishOptions,
    ) -> Result<TaskSetResult> {
        let taskset_id = generate_task_id();
        let mut task_ids = Vec::with_capacity(self.parts.len());

        for (args, kwargs) in &self.parts {
            let task_id = publisher
                .delay_task_in_set(
                    &taskset_id,
                    &self.task_name,
                    args.clone(),
                    kwargs.clone(),
                    options,
                )
                .await?;
            task_ids.push(task_id);
        }

        debug!(
            "任务集 {} 提交完成, 共 {} 个成员",
            taskset_id,
            task_ids.len()
        );
        Ok(TaskSetResult {
            taskset_id,
            task_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use conveyor_testing_utils::{FailingTransport, RecordingTransport};
    use serde_json::json;

    fn publisher_with_recorder() -> (TaskPublisher, Arc<RecordingTransport>, SignalHub) {
        let transport = Arc::new(RecordingTransport::new());
        let signals = SignalHub::default();
        let publisher = TaskPublisher::new(transport.clone(), signals.clone());
        (publisher, transport, signals)
    }

    #[tokio::test]
    async fn test_delay_task_returns_generated_id_and_notifies_once() {
        let (publisher, transport, signals) = publisher_with_recorder();
        let mut events = signals.subscribe_task_sent();

        let task_id = publisher
            .delay_task(
                "demo.add",
                vec![json!(2), json!(3)],
                serde_json::Map::new(),
                &PublishOptions::default(),
            )
            .await
            .unwrap();

        assert!(!task_id.is_empty());

        let sent = transport.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].task_id, task_id);
        assert_eq!(sent[0].retries, 0);
        assert!(sent[0].eta.is_none());

        // 通知恰好一次, 字段与信封一致
        let event = events.recv().await.unwrap();
        assert_eq!(event.task_id, task_id);
        assert_eq!(event.task_name, "demo.add");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_supplied_task_id_is_respected() {
        let (publisher, transport, _signals) = publisher_with_recorder();

        let options = PublishOptions {
            task_id: Some("retry-me".to_string()),
            retries: Some(2),
            ..PublishOptions::default()
        };
        let task_id = publisher
            .delay_task("demo.flaky", vec![], serde_json::Map::new(), &options)
            .await
            .unwrap();

        assert_eq!(task_id, "retry-me");
        let sent = transport.sent_messages();
        assert_eq!(sent[0].task_id, "retry-me");
        assert_eq!(sent[0].retries, 2);
    }

    #[tokio::test]
    async fn test_countdown_translates_to_future_eta() {
        let (publisher, transport, _signals) = publisher_with_recorder();

        let before = Utc::now();
        publisher
            .delay_task(
                "demo.later",
                vec![],
                serde_json::Map::new(),
                &PublishOptions {
                    countdown: Some(30),
                    ..PublishOptions::default()
                },
            )
            .await
            .unwrap();

        let eta = transport.sent_messages()[0].eta.expect("countdown应生成eta");
        assert!(eta >= before + Duration::seconds(29));
        assert!(eta <= Utc::now() + Duration::seconds(31));
    }

    #[tokio::test]
    async fn test_explicit_eta_wins_over_countdown() {
        let (publisher, transport, _signals) = publisher_with_recorder();

        let explicit = Utc::now() + Duration::seconds(300);
        publisher
            .delay_task(
                "demo.later",
                vec![],
                serde_json::Map::new(),
                &PublishOptions {
                    eta: Some(explicit),
                    countdown: Some(5),
                    ..PublishOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(transport.sent_messages()[0].eta, Some(explicit));
    }

    #[tokio::test]
    async fn test_send_options_passed_through() {
        let (publisher, transport, _signals) = publisher_with_recorder();

        let options = PublishOptions {
            send: SendOptions {
                mandatory: true,
                immediate: true,
                priority: Some(9),
                routing_key: Some("urgent".to_string()),
                serializer: None,
            },
            ..PublishOptions::default()
        };
        publisher
            .delay_task("demo.urgent", vec![], serde_json::Map::new(), &options)
            .await
            .unwrap();

        let recorded = transport.sent_options();
        assert!(recorded[0].mandatory);
        assert!(recorded[0].immediate);
        assert_eq!(recorded[0].priority, Some(9));
        assert_eq!(recorded[0].routing_key.as_deref(), Some("urgent"));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_without_notification() {
        let transport = Arc::new(FailingTransport::new("broker不可达"));
        let signals = SignalHub::default();
        let mut events = signals.subscribe_task_sent();
        let publisher = TaskPublisher::new(transport, signals.clone());

        let result = publisher
            .delay_task(
                "demo.add",
                vec![],
                serde_json::Map::new(),
                &PublishOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(ConveyorError::Transport(_))));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_task_name_rejected() {
        let (publisher, transport, _signals) = publisher_with_recorder();
        let result = publisher
            .delay_task("", vec![], serde_json::Map::new(), &PublishOptions::default())
            .await;
        assert!(matches!(result, Err(ConveyorError::InvalidTaskParams(_))));
        assert!(transport.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_taskset_members_share_set_id_with_distinct_task_ids() {
        let (publisher, transport, _signals) = publisher_with_recorder();

        let result = TaskSet::new("demo.add")
            .add_part(vec![json!(1), json!(1)], serde_json::Map::new())
            .add_part(vec![json!(2), json!(2)], serde_json::Map::new())
            .run(&publisher, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(result.task_ids.len(), 2);
        assert_ne!(result.task_ids[0], result.task_ids[1]);

        let sent = transport.sent_messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].taskset_id.as_deref(), Some(result.taskset_id.as_str()));
        assert_eq!(sent[1].taskset_id.as_deref(), Some(result.taskset_id.as_str()));
    }

    #[tokio::test]
    async fn test_concurrent_publishes_get_distinct_ids() {
        let (publisher, transport, _signals) = publisher_with_recorder();
        let publisher = Arc::new(publisher);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let publisher = publisher.clone();
            handles.push(tokio::spawn(async move {
                publisher
                    .delay_task(
                        "demo.add",
                        vec![],
                        serde_json::Map::new(),
                        &PublishOptions::default(),
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert_eq!(transport.sent_messages().len(), 8);
    }
}
