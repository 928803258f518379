use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{error, info};

use conveyor_core::{ConveyorError, Result, TaskMessage};

/// 单次任务执行的结果
///
/// 任务级失败(非零退出码, HTTP错误状态)表达为success=false的结果,
/// 只有执行器自身无法开展工作(参数损坏, 进程起不来)才返回Err。
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub success: bool,
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u64,
}

impl TaskOutcome {
    pub fn succeeded(output: Option<String>, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            output,
            error_message: None,
            exit_code: Some(0),
            execution_time_ms,
        }
    }
}

/// 任务执行器接口
///
/// 一个执行器按任务名注册进注册表, 负责把信封里的参数翻译成实际动作。
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// 执行器种类名, 用于日志
    fn name(&self) -> &str;

    /// 执行一个任务
    async fn run(&self, task: &TaskMessage) -> Result<TaskOutcome>;
}

/// Shell任务参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellTaskParams {
    /// 要执行的命令
    pub command: String,
    /// 命令参数
    pub args: Option<Vec<String>>,
    /// 工作目录
    pub working_dir: Option<String>,
    /// 环境变量
    pub env_vars: Option<HashMap<String, String>>,
}

/// Shell任务执行器
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskExecutor for ShellExecutor {
    fn name(&self) -> &str {
        "shell"
    }

    async fn run(&self, task: &TaskMessage) -> Result<TaskOutcome> {
        let start_time = Instant::now();

        let params: ShellTaskParams =
            serde_json::from_value(serde_json::Value::Object(task.kwargs.clone())).map_err(
                |e| ConveyorError::InvalidTaskParams(format!("解析Shell任务参数失败: {e}")),
            )?;

        let args = params.args.unwrap_or_default();
        info!(
            "执行Shell任务: task_id={}, command={}, args={:?}",
            task.task_id, params.command, args
        );

        let mut cmd = Command::new(&params.command);
        cmd.args(&args);
        if let Some(ref dir) = params.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in params.env_vars.unwrap_or_default() {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| ConveyorError::execution_error(format!("启动Shell命令失败: {e}")))?;

        let execution_time = start_time.elapsed();
        let exit_code = output.status.code();
        let success = output.status.success();

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let result = TaskOutcome {
            success,
            output: (!stdout.is_empty()).then(|| stdout.trim_end().to_string()),
            error_message: if !stderr.is_empty() {
                Some(stderr.trim_end().to_string())
            } else if !success {
                Some(format!("命令执行失败, 退出码: {exit_code:?}"))
            } else {
                None
            },
            exit_code,
            execution_time_ms: execution_time.as_millis() as u64,
        };

        info!(
            "Shell任务执行完成: task_id={}, success={}, exit_code={:?}, duration={}ms",
            task.task_id, success, exit_code, result.execution_time_ms
        );
        Ok(result)
    }
}

/// HTTP任务参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTaskParams {
    /// 请求URL
    pub url: String,
    /// HTTP方法
    pub method: Option<String>,
    /// 请求头
    pub headers: Option<HashMap<String, String>>,
    /// 请求体
    pub body: Option<String>,
    /// 超时时间(秒)
    pub timeout_seconds: Option<u64>,
}

/// HTTP任务执行器
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskExecutor for HttpExecutor {
    fn name(&self) -> &str {
        "http"
    }

    async fn run(&self, task: &TaskMessage) -> Result<TaskOutcome> {
        let start_time = Instant::now();

        let params: HttpTaskParams =
            serde_json::from_value(serde_json::Value::Object(task.kwargs.clone())).map_err(
                |e| ConveyorError::InvalidTaskParams(format!("解析HTTP任务参数失败: {e}")),
            )?;

        let method = params.method.unwrap_or_else(|| "GET".to_string());
        info!(
            "执行HTTP任务: task_id={}, method={}, url={}",
            task.task_id, method, params.url
        );

        let mut request_builder = match method.to_uppercase().as_str() {
            "GET" => self.client.get(&params.url),
            "POST" => self.client.post(&params.url),
            "PUT" => self.client.put(&params.url),
            "DELETE" => self.client.delete(&params.url),
            "PATCH" => self.client.patch(&params.url),
            "HEAD" => self.client.head(&params.url),
            _ => {
                return Err(ConveyorError::InvalidTaskParams(format!(
                    "不支持的HTTP方法: {method}"
                )));
            }
        };

        if let Some(timeout_seconds) = params.timeout_seconds {
            request_builder =
                request_builder.timeout(std::time::Duration::from_secs(timeout_seconds));
        }
        for (key, value) in params.headers.unwrap_or_default() {
            request_builder = request_builder.header(&key, &value);
        }
        if let Some(body) = params.body {
            request_builder = request_builder.body(body);
        }

        let response_result = request_builder.send().await;
        let execution_time = start_time.elapsed();

        match response_result {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let success = response.status().is_success();
                let response_body = response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("读取响应体失败: {e}"));

                info!(
                    "HTTP任务执行完成: task_id={}, success={}, status={}, duration={}ms",
                    task.task_id,
                    success,
                    status_code,
                    execution_time.as_millis()
                );

                Ok(TaskOutcome {
                    success,
                    output: Some(format!(
                        "HTTP {} {}\nStatus: {}\n{}",
                        method, params.url, status_code, response_body
                    )),
                    error_message: if success {
                        None
                    } else {
                        Some(format!("HTTP请求失败, 状态码: {status_code}"))
                    },
                    exit_code: Some(status_code as i32),
                    execution_time_ms: execution_time.as_millis() as u64,
                })
            }
            Err(e) => {
                let error_message = format!("HTTP请求失败: {e}");
                error!(
                    "HTTP任务执行失败: task_id={}, error={}",
                    task.task_id, error_message
                );

                Ok(TaskOutcome {
                    success: false,
                    output: None,
                    error_message: Some(error_message),
                    exit_code: None,
                    execution_time_ms: execution_time.as_millis() as u64,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shell_task(kwargs: serde_json::Value) -> TaskMessage {
        let map = kwargs.as_object().cloned().unwrap_or_default();
        TaskMessage::new("ops.shell").with_kwargs(map)
    }

    #[tokio::test]
    async fn test_shell_executor_captures_stdout() {
        let executor = ShellExecutor::new();
        let task = shell_task(json!({"command": "echo", "args": ["hello"]}));

        let outcome = executor.run(&task).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.output.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_shell_executor_nonzero_exit_is_failed_outcome() {
        let executor = ShellExecutor::new();
        let task = shell_task(json!({"command": "false"}));

        let outcome = executor.run(&task).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(1));
        assert!(outcome.error_message.is_some());
    }

    #[tokio::test]
    async fn test_shell_executor_env_vars_visible_to_command() {
        let executor = ShellExecutor::new();
        let task = shell_task(json!({
            "command": "sh",
            "args": ["-c", "echo $GREETING"],
            "env_vars": {"GREETING": "from-env"}
        }));

        let outcome = executor.run(&task).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output.as_deref(), Some("from-env"));
    }

    #[tokio::test]
    async fn test_shell_executor_missing_command_rejected() {
        let executor = ShellExecutor::new();
        let task = shell_task(json!({"args": ["hello"]}));

        let result = executor.run(&task).await;
        assert!(matches!(result, Err(ConveyorError::InvalidTaskParams(_))));
    }

    #[tokio::test]
    async fn test_http_executor_rejects_unsupported_method() {
        let executor = HttpExecutor::new();
        let task = TaskMessage::new("ops.http").with_kwargs(
            json!({"url": "http://localhost/ping", "method": "TRACE"})
                .as_object()
                .cloned()
                .unwrap(),
        );

        let result = executor.run(&task).await;
        assert!(matches!(result, Err(ConveyorError::InvalidTaskParams(_))));
    }

    #[tokio::test]
    async fn test_http_executor_connection_error_is_failed_outcome() {
        let executor = HttpExecutor::new();
        // 1号端口上没有监听者, 连接立刻被拒绝
        let task = TaskMessage::new("ops.http").with_kwargs(
            json!({"url": "http://127.0.0.1:1/", "timeout_seconds": 2})
                .as_object()
                .cloned()
                .unwrap(),
        );

        let outcome = executor.run(&task).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error_message.is_some());
        assert_eq!(outcome.exit_code, None);
    }
}
