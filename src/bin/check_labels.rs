// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/bin/check_labels.rs - 检查训练数据中的标签
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
use tracing::info;

use shouyu::{
  dataset::{Dataset, LabelEncoder},
  label::LabelFile,
  landmark::FeatureLayout,
};

/// 标签检查参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 训练数据 CSV
  #[arg(long, value_name = "DATASET")]
  pub dataset: PathBuf,
  /// 特征宽度 63 或 126，缺省时从数据推断
  #[arg(long, value_name = "WIDTH")]
  pub width: Option<usize>,
  /// 写出标签文件骨架（TOML）
  #[arg(long, value_name = "LABELS")]
  pub output: Option<PathBuf>,
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
  let counts = dataset.class_counts();
  let encoder = LabelEncoder::fit(dataset.samples().iter().map(|s| s.label.as_str()));

  info!(
    "有效行 {}, 丢弃 {}, 类别 {}",
    dataset.len(),
    dataset.dropped(),
    encoder.len()
  );
  for (index, label) in encoder.classes().iter().enumerate() {
    info!(
      "{:>3}: {} ({} 条)",
      index,
      label,
      counts.get(label.as_str()).copied().unwrap_or(0)
    );
  }

  if let Some(path) = &args.output {
    LabelFile::new(encoder.classes().to_vec()).save(path)?;
  }

  Ok(())
}
