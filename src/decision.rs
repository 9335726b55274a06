// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/decision.rs - 标签判定与同义词合并
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

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::label::{LabelError, LabelFile, LabelVocabulary, SynonymMap};

/// 判定引擎的不可变配置，启动时构造一次后共享
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionConfig {
  vocabulary: LabelVocabulary,
  synonyms: SynonymMap,
  threshold: f32,
  sentinel: String,
}

impl DecisionConfig {
  pub fn new(
    vocabulary: LabelVocabulary,
    synonyms: SynonymMap,
    threshold: f32,
    sentinel: impl Into<String>,
  ) -> Result<Self, LabelError> {
    if !(0.0..=1.0).contains(&threshold) {
      return Err(LabelError::InvalidThreshold(threshold));
    }
    let sentinel = sentinel.into();
    if vocabulary.contains(&sentinel) || synonyms.targets().any(|t| t == sentinel) {
      return Err(LabelError::SentinelCollision(sentinel));
    }

    Ok(Self {
      vocabulary,
      synonyms,
      threshold,
      sentinel,
    })
  }

  pub fn from_label_file(file: LabelFile) -> Result<Self, LabelError> {
    let threshold = file.threshold;
    let sentinel = file.sentinel.clone();
    let (vocabulary, synonyms) = file.into_parts()?;
    Self::new(vocabulary, synonyms, threshold, sentinel)
  }

  /// 用命令行参数覆盖文件中的阈值
  pub fn with_threshold(self, threshold: f32) -> Result<Self, LabelError> {
    Self::new(self.vocabulary, self.synonyms, threshold, self.sentinel)
  }

  pub fn vocabulary(&self) -> &LabelVocabulary {
    &self.vocabulary
  }

  pub fn synonyms(&self) -> &SynonymMap {
    &self.synonyms
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn sentinel(&self) -> &str {
    &self.sentinel
  }

  /// 对一次分类输出做出最终判定
  pub fn resolve(&self, distribution: &[f32]) -> Decision {
    resolve(self, distribution)
  }
}

/// 一次判定的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
  /// 最终标签，未通过阈值时为哨兵标签
  pub final_label: String,
  /// 原始最大概率（合并前）
  pub confidence: f32,
  /// 合并同义词后的最佳标签，无论是否通过阈值都会给出
  pub best_guess: String,
  /// 合并后最佳标签的概率之和
  pub merged_confidence: f32,
  /// 原始最大概率对应的标签
  pub raw_label: Option<String>,
  pub accepted: bool,
}

/// NaN、无穷与负数都按 0 处理，大于 1 的值截断为 1
fn sanitize(p: f32) -> f32 {
  if p.is_finite() && p > 0.0 { p.min(1.0) } else { 0.0 }
}

/// 判定流程：
///
/// 1. 原始最大概率，并列时取下标最小者；
/// 2. 按规范标签累加概率；
/// 3. 合并后最大者为 best_guess，并列时取字典序最小者；
/// 4. 用原始最大概率与阈值比较（`>=`），通过则输出规范标签，否则输出哨兵标签。
///
/// 分布与标签表长度不一致时只使用重叠部分；没有任何正概率的分布直接判为未检测到。
pub fn resolve(config: &DecisionConfig, distribution: &[f32]) -> Decision {
  let vocabulary = config.vocabulary();
  if distribution.len() != vocabulary.len() {
    warn!(
      "分类输出长度 {} 与标签数量 {} 不一致",
      distribution.len(),
      vocabulary.len()
    );
  }
  let classes = distribution.len().min(vocabulary.len());

  let mut raw_best: Option<(usize, f32)> = None;
  let mut merged: BTreeMap<&str, f32> = BTreeMap::new();
  for (index, &p) in distribution.iter().take(classes).enumerate() {
    let p = sanitize(p);
    if raw_best.is_none_or(|(_, best)| p > best) {
      raw_best = Some((index, p));
    }
    if let Some(raw) = vocabulary.get(index) {
      *merged.entry(config.synonyms().canonical(raw)).or_insert(0.0) += p;
    }
  }

  let (raw_label, raw_confidence) = match raw_best {
    Some((index, p)) => (vocabulary.get(index).map(str::to_string), p),
    None => (None, 0.0),
  };

  let mut merged_best: Option<(&str, f32)> = None;
  for (&label, &score) in &merged {
    if merged_best.is_none_or(|(_, best)| score > best) {
      merged_best = Some((label, score));
    }
  }

  let has_mass = raw_confidence > 0.0;
  let (best_guess, merged_confidence) = match merged_best {
    Some((label, score)) if has_mass => (label.to_string(), score.min(1.0)),
    _ => (config.sentinel().to_string(), 0.0),
  };

  let accepted = has_mass && raw_confidence >= config.threshold();
  let final_label = if accepted {
    best_guess.clone()
  } else {
    config.sentinel().to_string()
  };

  debug!(
    "判定: 原始 {:?}={:.4}, 合并 {}={:.4}, 阈值 {:.2}, 结果 {}",
    raw_label,
    raw_confidence,
    best_guess,
    merged_confidence,
    config.threshold(),
    final_label
  );

  Decision {
    final_label,
    confidence: raw_confidence,
    best_guess,
    merged_confidence,
    raw_label,
    accepted,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SENTINEL: &str = "No sign detected";

  fn config(labels: &[&str], synonyms: &[(&str, &str)], threshold: f32) -> DecisionConfig {
    let vocabulary = LabelVocabulary::new(labels.iter().map(|l| l.to_string()).collect()).unwrap();
    let synonyms = SynonymMap::new(
      &vocabulary,
      synonyms
        .iter()
        .map(|(raw, canonical)| (raw.to_string(), canonical.to_string())),
    )
    .unwrap();
    DecisionConfig::new(vocabulary, synonyms, threshold, SENTINEL).unwrap()
  }

  fn hello_config(threshold: f32) -> DecisionConfig {
    config(&["HELLO", "Hello", "YES", "NO"], &[("Hello", "HELLO")], threshold)
  }

  #[test]
  fn synonyms_are_summed_before_merged_best() {
    let decision = hello_config(0.25).resolve(&[0.3, 0.25, 0.2, 0.25]);
    assert_eq!(decision.raw_label.as_deref(), Some("HELLO"));
    assert_eq!(decision.confidence, 0.3);
    assert_eq!(decision.best_guess, "HELLO");
    assert!((decision.merged_confidence - 0.55).abs() < 1e-6);
    assert_eq!(decision.final_label, "HELLO");
  }

  #[test]
  fn merged_label_wins_even_when_raw_best_differs() {
    // 原始最大为 YES，但 HELLO + Hello 合并后更大
    let decision = hello_config(0.3).resolve(&[0.2, 0.2, 0.35, 0.25]);
    assert_eq!(decision.raw_label.as_deref(), Some("YES"));
    assert_eq!(decision.best_guess, "HELLO");
    assert_eq!(decision.final_label, "HELLO");
    assert_eq!(decision.confidence, 0.35);
  }

  #[test]
  fn below_threshold_is_rejected_regardless_of_merged_score() {
    let decision = hello_config(0.5).resolve(&[0.3, 0.25, 0.2, 0.25]);
    assert!(!decision.accepted);
    assert_eq!(decision.final_label, SENTINEL);
    assert_eq!(decision.confidence, 0.3);
    assert_eq!(decision.best_guess, "HELLO");
  }

  #[test]
  fn threshold_boundary_is_inclusive() {
    let cfg = config(&["NO", "YES"], &[], 0.75);
    let decision = cfg.resolve(&[0.75, 0.25]);
    assert!(decision.accepted);
    assert_eq!(decision.final_label, "NO");

    let decision = cfg.resolve(&[0.7499, 0.2501]);
    assert!(!decision.accepted);
  }

  #[test]
  fn raw_ties_pick_lowest_index() {
    let cfg = config(&["B", "A"], &[], 0.1);
    let decision = cfg.resolve(&[0.5, 0.5]);
    assert_eq!(decision.raw_label.as_deref(), Some("B"));
  }

  #[test]
  fn merged_ties_pick_lexicographically_smallest() {
    let cfg = config(&["B", "A"], &[], 0.1);
    let decision = cfg.resolve(&[0.5, 0.5]);
    assert_eq!(decision.best_guess, "A");
    assert_eq!(decision.final_label, "A");
  }

  #[test]
  fn all_zero_distribution_resolves_to_sentinel() {
    let decision = config(&["NO", "YES"], &[], 0.0).resolve(&[0.0, 0.0]);
    assert!(!decision.accepted);
    assert_eq!(decision.final_label, SENTINEL);
    assert_eq!(decision.confidence, 0.0);
    assert_eq!(decision.best_guess, SENTINEL);
  }

  #[test]
  fn nan_and_empty_distributions_do_not_panic() {
    let cfg = config(&["NO", "YES"], &[], 0.5);
    let decision = cfg.resolve(&[f32::NAN, f32::NAN]);
    assert_eq!(decision.final_label, SENTINEL);
    assert_eq!(decision.confidence, 0.0);

    let decision = cfg.resolve(&[]);
    assert_eq!(decision.final_label, SENTINEL);
    assert_eq!(decision.raw_label, None);

    let decision = cfg.resolve(&[f32::NAN, 0.8]);
    assert_eq!(decision.final_label, "YES");
    assert_eq!(decision.confidence, 0.8);
  }

  #[test]
  fn resolution_is_idempotent() {
    let cfg = hello_config(0.25);
    let distribution = [0.3, 0.25, 0.2, 0.25];
    assert_eq!(cfg.resolve(&distribution), cfg.resolve(&distribution));
  }

  #[test]
  fn unnormalised_distribution_is_tolerated() {
    let decision = config(&["NO", "YES"], &[], 0.5).resolve(&[0.9, 0.2]);
    assert_eq!(decision.final_label, "NO");
    assert_eq!(decision.confidence, 0.9);
  }

  #[test]
  fn confidence_is_capped_at_one() {
    let decision = config(&["NO", "YES"], &[], 0.5).resolve(&[3.0, 0.5]);
    assert_eq!(decision.final_label, "NO");
    assert_eq!(decision.confidence, 1.0);

    let decision = config(&["YES", "Yes"], &[("Yes", "YES")], 0.5).resolve(&[0.8, 0.7]);
    assert_eq!(decision.final_label, "YES");
    assert_eq!(decision.confidence, 0.8);
    assert_eq!(decision.merged_confidence, 1.0);
  }

  #[test]
  fn sentinel_cannot_be_a_label_or_synonym_target() {
    let vocabulary = LabelVocabulary::new(vec!["NO".into(), SENTINEL.into()]).unwrap();
    assert!(matches!(
      DecisionConfig::new(vocabulary, SynonymMap::identity(), 0.5, SENTINEL),
      Err(LabelError::SentinelCollision(l)) if l == SENTINEL
    ));

    let vocabulary = LabelVocabulary::new(vec!["NO".into(), "NOPE".into()]).unwrap();
    let synonyms =
      SynonymMap::new(&vocabulary, [("NOPE".to_string(), SENTINEL.to_string())]).unwrap();
    assert!(matches!(
      DecisionConfig::new(vocabulary, synonyms, 0.5, SENTINEL),
      Err(LabelError::SentinelCollision(_))
    ));
  }

  #[test]
  fn threshold_outside_unit_range_is_rejected() {
    let vocabulary = LabelVocabulary::new(vec!["NO".into()]).unwrap();
    assert!(matches!(
      DecisionConfig::new(vocabulary, SynonymMap::identity(), 1.5, SENTINEL),
      Err(LabelError::InvalidThreshold(_))
    ));
  }
}
