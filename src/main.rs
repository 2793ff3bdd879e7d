#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use tracing::{info, warn};
use std::sync::Arc;
use media_trigger_rs::{
    backend::{BatchBackend, DryRunBatchBackend, HttpBatchBackend},
    config::AppConfig,
    dispatch::{Dispatcher, HttpDeadLetter, HttpNotifier, Notifier},
    monitor::{HttpJobSummarySink, JobMonitor},
    trigger::{TriggerContext, TriggerRegistry},
    utils::logger,
    AppContext, DB_PATH, LOG_DIR,
};
use media_trigger_rs::storage::history::{sqlite::SqliteHistoryStore, HistoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    media_trigger_rs::init_env();

    // 初始化日志系统
    let _guard = logger::init(LOG_DIR.clone())?;

    info!("Starting media trigger service (rev {})...", env!("GIT_HASH"));

    // 加载配置
    let config = AppConfig::from_env()?;

    // 初始化计算后端
    let backend: Arc<dyn BatchBackend> = match &config.batch_api_url {
        Some(url) => {
            info!("Submitting jobs to {}", url);
            Arc::new(HttpBatchBackend::new(url.clone())?)
        }
        None => {
            warn!("BATCH_API_URL not set, jobs are accepted without being submitted");
            Arc::new(DryRunBatchBackend::new())
        }
    };

    // 初始化通知与死信通道
    let notifier: Option<Arc<dyn Notifier>> = config
        .dispatch
        .notification_url
        .clone()
        .map(|url| Arc::new(HttpNotifier::new(url)) as Arc<dyn Notifier>);
    if config.dispatch.enable_notifications && notifier.is_none() {
        warn!("ENABLE_NOTIFICATIONS is set but NOTIFICATION_URL is missing");
    }

    // 初始化 storage
    info!("Initializing Storage...");
    let history: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::new(&DB_PATH).await?);

    // 初始化调度器
    info!("Initializing Dispatcher...");
    let registry = TriggerRegistry::builtin();
    let context = TriggerContext::new(config.trigger.clone(), backend);
    let mut dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(context))
        .with_history(history.clone());
    if let Some(notifier) = &notifier {
        dispatcher = dispatcher.with_notifier(notifier.clone(), config.dispatch.enable_notifications);
    }
    if let Some(url) = &config.dispatch.dlq_url {
        dispatcher = dispatcher.with_dead_letter(Arc::new(HttpDeadLetter::new(url.clone())));
    }

    let mut monitor = JobMonitor::new(config.trigger.output_bucket.clone(), notifier);
    if let Some(url) = &config.job_summary_url {
        monitor = monitor.with_summary_sink(Arc::new(HttpJobSummarySink::new(url.clone())));
    }

    // 创建应用上下文
    let ctx = Arc::new(AppContext {
        dispatcher: Arc::new(dispatcher),
        history,
        monitor: Arc::new(monitor),
    });

    info!("Starting HTTP server at http://{}", config.listen_addr);

    // 启动 HTTP 服务器
    match media_trigger_rs::web::start_server(ctx.clone(), config.listen_addr).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            return Err(e);
        }
    }

    info!("Shutting down...");
    Ok(())
}
