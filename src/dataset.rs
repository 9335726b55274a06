// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/dataset.rs - 训练数据集清洗、标签编码与划分
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

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::landmark::FeatureLayout;

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("CSV 错误: {0}")]
  CsvError(#[from] csv::Error),
  #[error("数据集为空: 清洗后没有有效行 (丢弃 {dropped} 行)")]
  Empty { dropped: usize },
}

/// 一行训练样本
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
  pub features: Vec<f32>,
  pub label: String,
}

/// 清洗后的数据集
#[derive(Debug, Clone)]
pub struct Dataset {
  layout: FeatureLayout,
  samples: Vec<Sample>,
  dropped: usize,
}

/// 解析一个特征列，非有限数值视为失败
fn parse_feature(field: &str) -> Option<f32> {
  field.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

/// 判断一行是否为 `width` 个数值列加一个非空标签列
fn parse_row(record: &StringRecord, width: usize) -> Option<Sample> {
  if record.len() != width + 1 {
    return None;
  }

  let features = record
    .iter()
    .take(width)
    .map(parse_feature)
    .collect::<Option<Vec<f32>>>()?;
  let label = record.get(width)?.trim();
  if label.is_empty() {
    return None;
  }

  Some(Sample {
    features,
    label: label.to_string(),
  })
}

/// 以第一条可解析的行推断特征宽度
fn infer_layout(records: &[StringRecord]) -> Option<FeatureLayout> {
  records.iter().find_map(|record| {
    let layout = FeatureLayout::from_width(record.len().checked_sub(1)?)?;
    parse_row(record, layout.width()).map(|_| layout)
  })
}

impl Dataset {
  pub fn load(path: impl AsRef<Path>, layout: Option<FeatureLayout>) -> Result<Self, DatasetError> {
    let path = path.as_ref();
    info!("加载数据集: {}", path.display());
    let file = std::fs::File::open(path)?;
    Self::from_reader(file, layout)
  }

  /// 读取 CSV 并丢弃表头或损坏的行（任一特征列不能转换为数值）
  pub fn from_reader<R: Read>(reader: R, layout: Option<FeatureLayout>) -> Result<Self, DatasetError> {
    let mut reader = ReaderBuilder::new()
      .has_headers(false)
      .flexible(true)
      .from_reader(reader);

    let records = reader.records().collect::<Result<Vec<_>, _>>()?;
    let total = records.len();

    let Some(layout) = layout.or_else(|| infer_layout(&records)) else {
      warn!("数据集 {} 行中没有任何有效行", total);
      return Err(DatasetError::Empty { dropped: total });
    };

    let samples: Vec<Sample> = records
      .iter()
      .filter_map(|record| parse_row(record, layout.width()))
      .collect();
    let dropped = total - samples.len();

    if dropped > 0 {
      warn!("丢弃 {} 行无效数据（表头或损坏的行）", dropped);
    }
    if samples.is_empty() {
      return Err(DatasetError::Empty { dropped });
    }

    info!(
      "数据集加载完成: {} 行有效, 特征布局 {}",
      samples.len(),
      layout
    );
    Ok(Self {
      layout,
      samples,
      dropped,
    })
  }

  pub fn layout(&self) -> FeatureLayout {
    self.layout
  }

  pub fn samples(&self) -> &[Sample] {
    &self.samples
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  /// 清洗时丢弃的行数
  pub fn dropped(&self) -> usize {
    self.dropped
  }

  /// 每个标签的样本数
  pub fn class_counts(&self) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for sample in &self.samples {
      *counts.entry(sample.label.as_str()).or_insert(0) += 1;
    }
    counts
  }
}

/// 标签编码器，类别按字典序排序后的位置即为类别下标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
  classes: Vec<String>,
}

impl LabelEncoder {
  pub fn fit<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
    let classes: BTreeSet<&str> = labels.into_iter().collect();
    Self {
      classes: classes.into_iter().map(str::to_string).collect(),
    }
  }

  pub fn transform(&self, label: &str) -> Option<usize> {
    self
      .classes
      .binary_search_by(|c| c.as_str().cmp(label))
      .ok()
  }

  pub fn classes(&self) -> &[String] {
    &self.classes
  }

  pub fn len(&self) -> usize {
    self.classes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.classes.is_empty()
  }
}

/// 按固定种子打乱后划分训练集与测试集，返回样本下标
pub fn train_test_split(len: usize, test_fraction: f32, seed: u64) -> (Vec<usize>, Vec<usize>) {
  let mut indices: Vec<usize> = (0..len).collect();
  let mut rng = StdRng::seed_from_u64(seed);
  indices.shuffle(&mut rng);

  let test_len = if len < 2 {
    0
  } else {
    ((len as f32 * test_fraction.clamp(0.0, 1.0)).ceil() as usize).min(len - 1)
  };
  let train = indices.split_off(test_len);
  debug!("训练集 {} 条, 测试集 {} 条", train.len(), indices.len());
  (train, indices)
}
