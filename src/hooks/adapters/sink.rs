//! 事件下游（Sink）
//!
//! - [`EventSink`] 为非阻塞、尽力而为的投递接口，调用方不等待确认、不重试
//! - [`BatchingSink`] 在后台任务中按条数或延迟阈值攒批，再交给 [`BatchTransport`]
//! - `kafka` feature 下提供基于 rdkafka 的 [`KafkaBatchTransport`]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::SinkError;

/// 事件下游句柄，必须支持并发提交
#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    /// 提交一条已编码的事件，立即返回
    fn publish(&self, payload: Vec<u8>) -> Result<(), SinkError>;

    /// 停止接收并等待已提交的事件发送完毕，重复调用无副作用
    async fn close(&self) {}
}

/// 批量发送通道
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn send_batch(&self, destination: &str, batch: Vec<Vec<u8>>) -> Result<(), SinkError>;
}

/// 攒批阈值，默认 10 条或 1 秒先到先发
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub count_threshold: usize,
    pub delay_threshold_ms: u64,
    pub buffer_capacity: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            count_threshold: 10,
            delay_threshold_ms: 1_000,
            buffer_capacity: 10_000,
        }
    }
}

impl BatchSettings {
    pub fn delay_threshold(&self) -> Duration {
        Duration::from_millis(self.delay_threshold_ms.max(1))
    }
}

/// 带后台攒批任务的 Sink
pub struct BatchingSink {
    destination: String,
    sender: mpsc::Sender<Vec<u8>>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BatchingSink {
    /// 创建 Sink 并启动后台刷新任务，需在 tokio 运行时内调用
    pub fn spawn<S: Into<String>>(
        destination: S,
        transport: Arc<dyn BatchTransport>,
        settings: BatchSettings,
    ) -> Arc<Self> {
        let destination = destination.into();
        let (sender, receiver) = mpsc::channel(settings.buffer_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(flush_loop(
            destination.clone(),
            receiver,
            shutdown_rx,
            transport,
            settings,
        ));
        Arc::new(Self {
            destination,
            sender,
            shutdown,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[async_trait]
impl EventSink for BatchingSink {
    fn name(&self) -> &str {
        &self.destination
    }

    fn publish(&self, payload: Vec<u8>) -> Result<(), SinkError> {
        self.sender.try_send(payload).map_err(|err| match err {
            TrySendError::Full(_) => SinkError::Full(self.destination.clone()),
            TrySendError::Closed(_) => SinkError::Closed(self.destination.clone()),
        })
    }

    async fn close(&self) {
        let _ = self.shutdown.send(true);
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        if let Err(err) = worker.await {
            tracing::error!(destination = %self.destination, error = %err, "flush loop terminated abnormally");
        }
    }
}

async fn flush_loop(
    destination: String,
    mut receiver: mpsc::Receiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
    transport: Arc<dyn BatchTransport>,
    settings: BatchSettings,
) {
    let count_threshold = settings.count_threshold.max(1);
    let delay = settings.delay_threshold();
    let mut buffer = Vec::with_capacity(count_threshold);
    let mut ticker = tokio::time::interval_at(Instant::now() + delay, delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(payload) => {
                    buffer.push(payload);
                    if buffer.len() >= count_threshold {
                        flush(&destination, transport.as_ref(), &mut buffer).await;
                        ticker.reset();
                    }
                }
                None => {
                    flush(&destination, transport.as_ref(), &mut buffer).await;
                    tracing::debug!(destination = %destination, "sink closed, flush loop stopped");
                    break;
                }
            },
            _ = ticker.tick() => {
                flush(&destination, transport.as_ref(), &mut buffer).await;
            }
            _ = shutdown.changed() => {
                // 先拒绝新的提交，再发送通道中剩余的事件
                receiver.close();
                while let Some(payload) = receiver.recv().await {
                    buffer.push(payload);
                    if buffer.len() >= count_threshold {
                        flush(&destination, transport.as_ref(), &mut buffer).await;
                    }
                }
                flush(&destination, transport.as_ref(), &mut buffer).await;
                tracing::debug!(destination = %destination, "sink closed, flush loop stopped");
                break;
            }
        }
    }
}

async fn flush(destination: &str, transport: &dyn BatchTransport, buffer: &mut Vec<Vec<u8>>) {
    if buffer.is_empty() {
        return;
    }
    let batch: Vec<Vec<u8>> = buffer.drain(..).collect();
    let size = batch.len();
    if let Err(err) = transport.send_batch(destination, batch).await {
        tracing::error!(destination = %destination, batch_size = size, error = %err, "failed to flush event batch");
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaBatchTransport;

#[cfg(feature = "kafka")]
mod kafka {
    use std::time::Duration;

    use async_trait::async_trait;
    use futures_util::future::join_all;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};

    use super::BatchTransport;
    use crate::error::{ConfigError, SinkError};

    /// Kafka 批量发送，destination 即 Kafka topic
    pub struct KafkaBatchTransport {
        producer: FutureProducer,
        timeout: Duration,
    }

    impl KafkaBatchTransport {
        pub fn new(brokers: &str, timeout: Duration) -> Result<Self, ConfigError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", timeout.as_millis().to_string())
                .create()
                .map_err(|err| ConfigError::Invalid(format!("failed to create kafka producer: {err}")))?;
            Ok(Self { producer, timeout })
        }
    }

    #[async_trait]
    impl BatchTransport for KafkaBatchTransport {
        async fn send_batch(&self, destination: &str, batch: Vec<Vec<u8>>) -> Result<(), SinkError> {
            let sends = batch.iter().map(|payload| {
                let record = FutureRecord::<(), Vec<u8>>::to(destination).payload(payload);
                self.producer.send(record, self.timeout)
            });

            let failures: Vec<String> = join_all(sends)
                .await
                .into_iter()
                .filter_map(|result| result.err().map(|(err, _)| err.to_string()))
                .collect();

            if failures.is_empty() {
                Ok(())
            } else {
                Err(SinkError::Transport(format!(
                    "{} of {} records failed: {}",
                    failures.len(),
                    batch.len(),
                    failures[0]
                )))
            }
        }
    }
}
