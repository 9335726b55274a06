// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/bin/sign_server.rs - 手语识别推理服务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use shouyu::{
  FromUrl,
  decision::DecisionConfig,
  label::LabelFile,
  model::{Classifier, ModelWrapper},
  service::SignService,
};

/// 手语识别推理服务参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型文件，例如 dense:///path/model.json 或 onnx:///path/model.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 标签文件（TOML），标签顺序须与模型类别顺序一致
  #[arg(long, value_name = "LABELS")]
  pub labels: PathBuf,
  /// 置信度阈值 (0.0 - 1.0)，覆盖标签文件中的设置
  #[arg(long, value_name = "THRESHOLD")]
  pub threshold: Option<f32>,
  /// 监听地址
  #[arg(long, default_value = "127.0.0.1:8000", value_name = "ADDR")]
  pub listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
  let env_filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
  tracing_subscriber::registry()
    .with(env_filter)
    .with(tracing_subscriber::fmt::layer())
    .init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("标签文件路径: {}", args.labels.display());

  let model = ModelWrapper::from_url(&args.model)?;
  let mut config = DecisionConfig::from_label_file(LabelFile::load(&args.labels)?)?;
  if let Some(threshold) = args.threshold {
    info!("使用命令行阈值: {:.2}", threshold);
    config = config.with_threshold(threshold)?;
  }
  info!("特征宽度: {}", model.layout().width());

  let service = SignService::new(Arc::new(model), Arc::new(config))?;
  let listener = TcpListener::bind(args.listen).await?;
  shouyu::server::serve(listener, service).await?;

  Ok(())
}
