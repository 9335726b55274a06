// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/label.rs - 标签表与同义词映射
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

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_SENTINEL: &str = "No sign detected";
pub const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件解析错误: {0}")]
  ParseError(#[from] toml::de::Error),
  #[error("标签文件序列化错误: {0}")]
  SerializeError(#[from] toml::ser::Error),
  #[error("标签表为空")]
  EmptyVocabulary,
  #[error("标签重复: {0}")]
  DuplicateLabel(String),
  #[error("同义词 {0} 不在标签表中")]
  UnknownSynonym(String),
  #[error("置信度阈值必须在 [0, 1] 之间, 实际为 {0}")]
  InvalidThreshold(f32),
  #[error("标签 {0} 与未检测到时的哨兵文本相同")]
  SentinelCollision(String),
}

fn default_sentinel() -> String {
  DEFAULT_SENTINEL.to_string()
}

fn default_threshold() -> f32 {
  DEFAULT_THRESHOLD
}

/// 部署时的标签配置文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelFile {
  #[serde(default = "default_sentinel")]
  pub sentinel: String,
  #[serde(default = "default_threshold")]
  pub threshold: f32,
  pub labels: Vec<String>,
  #[serde(default)]
  pub synonyms: BTreeMap<String, String>,
}

impl LabelFile {
  pub fn new(labels: Vec<String>) -> Self {
    Self {
      sentinel: default_sentinel(),
      threshold: default_threshold(),
      labels,
      synonyms: BTreeMap::new(),
    }
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let file = Self::from_toml_str(&content)?;
    debug!("标签数量: {}, 同义词数量: {}", file.labels.len(), file.synonyms.len());
    Ok(file)
  }

  pub fn from_toml_str(content: &str) -> Result<Self, LabelError> {
    Ok(toml::from_str(content)?)
  }

  pub fn to_toml_string(&self) -> Result<String, LabelError> {
    Ok(toml::to_string_pretty(self)?)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LabelError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, self.to_toml_string()?)?;
    info!("保存标签文件到: {}", path.display());
    Ok(())
  }

  /// 校验并拆分为标签表与同义词映射
  pub fn into_parts(self) -> Result<(LabelVocabulary, SynonymMap), LabelError> {
    let vocabulary = LabelVocabulary::new(self.labels)?;
    let synonyms = SynonymMap::new(&vocabulary, self.synonyms)?;
    Ok((vocabulary, synonyms))
  }
}

/// 类别下标到原始标签的有序表，顺序由训练时的标签编码决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
  labels: Box<[String]>,
}

impl LabelVocabulary {
  pub fn new(labels: Vec<String>) -> Result<Self, LabelError> {
    if labels.is_empty() {
      return Err(LabelError::EmptyVocabulary);
    }

    let mut seen = HashSet::with_capacity(labels.len());
    for label in &labels {
      if !seen.insert(label.as_str()) {
        return Err(LabelError::DuplicateLabel(label.clone()));
      }
    }

    Ok(Self {
      labels: labels.into_boxed_slice(),
    })
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }

  pub fn position(&self, label: &str) -> Option<usize> {
    self.labels.iter().position(|l| l == label)
  }

  pub fn contains(&self, label: &str) -> bool {
    self.position(label).is_some()
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.labels.iter().map(String::as_str)
  }
}

/// 原始标签到规范标签的映射，未声明的标签映射到自身
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynonymMap {
  map: HashMap<String, String>,
}

impl SynonymMap {
  pub fn new(
    vocabulary: &LabelVocabulary,
    pairs: impl IntoIterator<Item = (String, String)>,
  ) -> Result<Self, LabelError> {
    let mut map = HashMap::new();
    for (raw, canonical) in pairs {
      if !vocabulary.contains(&raw) {
        return Err(LabelError::UnknownSynonym(raw));
      }
      if raw != canonical {
        map.insert(raw, canonical);
      }
    }
    Ok(Self { map })
  }

  pub fn identity() -> Self {
    Self::default()
  }

  pub fn canonical<'a>(&'a self, raw: &'a str) -> &'a str {
    self.map.get(raw).map(String::as_str).unwrap_or(raw)
  }

  /// 所有声明的规范标签
  pub fn targets(&self) -> impl Iterator<Item = &str> {
    self.map.values().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }
}
