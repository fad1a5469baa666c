use std::path::PathBuf;

use clap::Parser;
use dxfdoc_config::{AppConfig, ConfigError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod demo;

/// 在活动布局上构建示例图纸并输出概览。
#[derive(Debug, Parser)]
#[command(name = "dxfdoc", version)]
struct Cli {
    /// 配置文件路径，缺省时自动发现。
    #[arg(long)]
    config: Option<PathBuf>,
    /// 活动布局名称，覆盖配置中的设置。
    #[arg(long)]
    layout: Option<String>,
    /// 以 JSON 输出概览。
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let config = load_configuration(cli.config);
    init_logging(&config);
    info!("启动 dxfdoc 演示");

    let layout = cli.layout.or(config.document.active_layout);
    let summary = match demo::run(layout.as_deref(), config.underlay.path_check) {
        Ok(summary) => summary,
        Err(err) => {
            error!(error = %err, "构建演示图纸失败");
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                error!(error = %err, "序列化概览失败");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("活动布局: {} ({})", summary.layout, summary.block);
    println!("图元数量: {}", summary.entities);
    for (kind, count) in &summary.kinds {
        println!("  {kind}: {count}");
    }
    println!("已移除: {}, 因被依赖保留: {}", summary.removed, summary.retained);
    for underlay in &summary.underlays {
        println!(
            "参考底图 {}: {} [{}]",
            underlay.name, underlay.file, underlay.code_name
        );
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
