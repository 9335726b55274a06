// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/bin/sign_replay.rs - 录制关键点回放
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

use std::path::PathBuf;
use std::sync::Arc;
use std::{thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use shouyu::{
  FromUrl,
  decision::DecisionConfig,
  input::InputWrapper,
  label::LabelFile,
  model::ModelWrapper,
  output::OutputWrapper,
  service::SignService,
  task::{ContinuousTask, OneShotTask, Task},
};

/// 关键点回放参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型文件
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 标签文件（TOML）
  #[arg(long, value_name = "LABELS")]
  pub labels: PathBuf,
  /// 置信度阈值，覆盖标签文件中的设置
  #[arg(long, value_name = "THRESHOLD")]
  pub threshold: Option<f32>,
  /// 输入来源，例如 csv:///path/samples.csv 或 jsonl:///path/samples.jsonl
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出，例如 log: 或 jsonl:///path/records.jsonl?always
  #[arg(long, default_value = "log:", value_name = "OUTPUT")]
  pub output: Url,
  /// 最多处理的样本数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 只处理第一条样本
  #[arg(long)]
  pub one_shot: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let model = ModelWrapper::from_url(&args.model)?;
  let mut config = DecisionConfig::from_label_file(LabelFile::load(&args.labels)?)?;
  if let Some(threshold) = args.threshold {
    config = config.with_threshold(threshold)?;
  }
  let service = SignService::new(Arc::new(model), Arc::new(config))?;

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let summary = if args.one_shot {
    OneShotTask.run_task(input, &service, output)?
  } else {
    let (tx, rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .with_interrupt(rx)
      .run_task(input, &service, output)?
  };

  if let Some(accuracy) = summary.accuracy() {
    info!(
      "标注样本准确率: {:.2}% ({}/{})",
      accuracy * 100.0,
      summary.matched,
      summary.labelled
    );
  }

  Ok(())
}
