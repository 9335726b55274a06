// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/bin/sign_train.rs - 离线训练手语分类器
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

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{info, warn};

use shouyu::{
  dataset::Dataset,
  decision::DecisionConfig,
  label::LabelFile,
  landmark::FeatureLayout,
  train::{TrainConfig, fit},
};

/// 离线训练参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 训练数据 CSV，每行为特征列加末尾标签列
  #[arg(long, value_name = "DATASET")]
  pub dataset: PathBuf,
  /// 输出模型文件（JSON）
  #[arg(long, value_name = "MODEL")]
  pub model_output: PathBuf,
  /// 输出标签文件（TOML）
  #[arg(long, value_name = "LABELS")]
  pub labels_output: PathBuf,
  /// 从已有标签文件继承同义词、阈值与哨兵文本
  #[arg(long, value_name = "LABELS")]
  pub labels_template: Option<PathBuf>,
  /// 特征宽度 63 或 126，缺省时从数据推断
  #[arg(long, value_name = "WIDTH")]
  pub width: Option<usize>,
  /// 隐层宽度，逗号分隔
  #[arg(long, value_delimiter = ',', default_value = "128,64", value_name = "SIZES")]
  pub hidden: Vec<usize>,
  #[arg(long, default_value = "25", value_name = "EPOCHS")]
  pub epochs: usize,
  #[arg(long, default_value = "32", value_name = "SIZE")]
  pub batch_size: usize,
  #[arg(long, default_value = "0.001", value_name = "RATE")]
  pub learning_rate: f32,
  /// 测试集比例
  #[arg(long, default_value = "0.2", value_name = "FRACTION")]
  pub test_fraction: f32,
  #[arg(long, default_value = "42", value_name = "SEED")]
  pub seed: u64,
}

/// 只保留训练类别中存在的同义词
fn inherit_template(labels: &mut LabelFile, template: LabelFile) {
  labels.sentinel = template.sentinel;
  labels.threshold = template.threshold;
  for (alias, canonical) in template.synonyms {
    if labels.labels.contains(&alias) {
      labels.synonyms.insert(alias, canonical);
    } else {
      warn!("同义词 {} -> {} 不在训练类别中, 忽略", alias, canonical);
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let layout = match args.width {
    Some(width) => Some(
      FeatureLayout::from_width(width)
        .ok_or_else(|| anyhow!("特征宽度必须为 63 或 126, 实际为 {}", width))?,
    ),
    None => None,
  };

  let dataset = Dataset::load(&args.dataset, layout)?;
  for (label, count) in dataset.class_counts() {
    info!("类别 {}: {} 条", label, count);
  }

  let config = TrainConfig {
    hidden_layers: args.hidden,
    epochs: args.epochs,
    batch_size: args.batch_size,
    learning_rate: args.learning_rate,
    test_fraction: args.test_fraction,
    seed: args.seed,
  };
  let outcome = fit(&dataset, &config)?;

  if let Some(stats) = outcome.final_stats() {
    info!("训练集准确率: {:.2}%", stats.train_accuracy * 100.0);
    match stats.test_accuracy {
      Some(accuracy) => info!("测试集准确率: {:.2}%", accuracy * 100.0),
      None => warn!("测试集为空, 未评估"),
    }
  }

  let mut labels = outcome.label_file();
  if let Some(path) = &args.labels_template {
    inherit_template(&mut labels, LabelFile::load(path)?);
  }
  DecisionConfig::from_label_file(labels.clone())?;

  outcome.artifact.save(&args.model_output)?;
  labels.save(&args.labels_output)?;

  Ok(())
}
