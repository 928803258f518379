//! Mock implementations for the transport, callback and periodic traits
//!
//! This module provides in-memory test doubles that can be used for unit
//! testing without requiring a running message broker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use conveyor_core::{
    ConveyorError, ExecutionCallback, PeriodicBackend, Result, SendOptions, TaskMessage, Transport,
};

/// Mock transport that records every published message and serves
/// pre-fed messages on fetch
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(TaskMessage, SendOptions)>>,
    inbox: Mutex<VecDeque<TaskMessage>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message to be returned by the next fetch call
    pub fn feed(&self, task: TaskMessage) {
        self.inbox.lock().unwrap().push_back(task);
    }

    pub fn sent_messages(&self) -> Vec<TaskMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(task, _)| task.clone())
            .collect()
    }

    pub fn sent_options(&self) -> Vec<SendOptions> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, options)| options.clone())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, message: &TaskMessage, options: &SendOptions) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((message.clone(), options.clone()));
        Ok(())
    }

    async fn fetch(&self) -> Result<Option<TaskMessage>> {
        Ok(self.inbox.lock().unwrap().pop_front())
    }
}

/// Mock transport where every operation fails with a transport error
#[derive(Debug)]
pub struct FailingTransport {
    message: String,
}

impl FailingTransport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Transport for FailingTransport {
    async fn send(&self, _message: &TaskMessage, _options: &SendOptions) -> Result<()> {
        Err(ConveyorError::transport_error(self.message.clone()))
    }

    async fn fetch(&self) -> Result<Option<TaskMessage>> {
        Err(ConveyorError::transport_error(self.message.clone()))
    }
}

/// Mock callback that records every task handed to it
#[derive(Debug, Default)]
pub struct RecordingCallback {
    received: Mutex<Vec<TaskMessage>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<TaskMessage> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Poll until at least `count` tasks arrived or the timeout elapses
    pub async fn wait_for_count(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.received_count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.received_count() >= count
    }
}

#[async_trait]
impl ExecutionCallback for RecordingCallback {
    async fn execute(&self, task: TaskMessage) -> Result<()> {
        self.received.lock().unwrap().push(task);
        Ok(())
    }
}

/// Mock callback that fails on every task, counting the attempts
#[derive(Debug, Default)]
pub struct FailingCallback {
    calls: AtomicUsize,
}

impl FailingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionCallback for FailingCallback {
    async fn execute(&self, task: TaskMessage) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ConveyorError::execution_error(format!(
            "mock failure for task {}",
            task.task_id
        )))
    }
}

/// Mock periodic backend that counts how many times it was invoked
#[derive(Debug, Default)]
pub struct CountingBackend {
    calls: AtomicUsize,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeriodicBackend for CountingBackend {
    async fn run_due_periodic_tasks(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock periodic backend that always fails
#[derive(Debug)]
pub struct FailingBackend {
    message: String,
}

impl FailingBackend {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl PeriodicBackend for FailingBackend {
    async fn run_due_periodic_tasks(&self) -> Result<()> {
        Err(ConveyorError::execution_error(self.message.clone()))
    }
}
