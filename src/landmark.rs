// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/landmark.rs - 手部关键点与特征向量
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// 每只手的关键点数量
pub const LANDMARKS_PER_HAND: usize = 21;
/// 每个关键点的坐标数量 (x, y, z)
pub const COORDS_PER_LANDMARK: usize = 3;
/// 单手向量长度
pub const HAND_VECTOR_LEN: usize = LANDMARKS_PER_HAND * COORDS_PER_LANDMARK;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LandmarkError {
  #[error("关键点数量不匹配: 期望 {expected}, 实际 {actual}")]
  PointCount { expected: usize, actual: usize },
  #[error("向量长度不匹配: 期望 {expected}, 实际 {actual}")]
  VectorLength { expected: usize, actual: usize },
}

/// 单个关键点
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
  pub x: f32,
  pub y: f32,
  pub z: f32,
}

impl LandmarkPoint {
  pub fn new(x: f32, y: f32, z: f32) -> Self {
    Self { x, y, z }
  }
}

/// 姿态估计器给出的左右手标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
  Left,
  Right,
}

/// 单手向量，按关键点顺序展开为 x0,y0,z0,x1,y1,z1,...
#[derive(Debug, Clone, PartialEq)]
pub struct HandVector {
  data: Box<[f32]>,
}

impl Default for HandVector {
  fn default() -> Self {
    Self::zeros()
  }
}

impl HandVector {
  /// 未检测到的手用全零向量占位
  pub fn zeros() -> Self {
    Self {
      data: vec![0.0; HAND_VECTOR_LEN].into_boxed_slice(),
    }
  }

  pub fn from_points(points: &[LandmarkPoint]) -> Result<Self, LandmarkError> {
    if points.len() != LANDMARKS_PER_HAND {
      return Err(LandmarkError::PointCount {
        expected: LANDMARKS_PER_HAND,
        actual: points.len(),
      });
    }

    let data: Vec<f32> = points.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }

  pub fn from_flat(data: Vec<f32>) -> Result<Self, LandmarkError> {
    if data.len() != HAND_VECTOR_LEN {
      return Err(LandmarkError::VectorLength {
        expected: HAND_VECTOR_LEN,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }

  pub fn is_absent(&self) -> bool {
    self.data.iter().all(|v| *v == 0.0)
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

impl AsRef<[f32]> for HandVector {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

/// 一只被检测到的手
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedHand {
  pub handedness: Option<Handedness>,
  pub vector: HandVector,
}

impl DetectedHand {
  pub fn new(handedness: Option<Handedness>, vector: HandVector) -> Self {
    Self { handedness, vector }
  }
}

/// 部署模型的输入布局，启动时根据模型声明的输入宽度确定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureLayout {
  /// 单手 63 维
  SingleHand,
  /// 左手 + 右手 126 维
  DualHand,
}

impl FeatureLayout {
  pub fn width(&self) -> usize {
    match self {
      FeatureLayout::SingleHand => HAND_VECTOR_LEN,
      FeatureLayout::DualHand => HAND_VECTOR_LEN * 2,
    }
  }

  pub fn from_width(width: usize) -> Option<Self> {
    match width {
      HAND_VECTOR_LEN => Some(FeatureLayout::SingleHand),
      w if w == HAND_VECTOR_LEN * 2 => Some(FeatureLayout::DualHand),
      _ => None,
    }
  }
}

impl std::fmt::Display for FeatureLayout {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      FeatureLayout::SingleHand => write!(f, "单手({})", self.width()),
      FeatureLayout::DualHand => write!(f, "双手({})", self.width()),
    }
  }
}

/// 分类器输入向量
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
  layout: FeatureLayout,
  data: Box<[f32]>,
}

impl FeatureVector {
  pub fn from_raw(layout: FeatureLayout, data: Vec<f32>) -> Result<Self, LandmarkError> {
    if data.len() != layout.width() {
      return Err(LandmarkError::VectorLength {
        expected: layout.width(),
        actual: data.len(),
      });
    }

    Ok(Self {
      layout,
      data: data.into_boxed_slice(),
    })
  }

  pub fn layout(&self) -> FeatureLayout {
    self.layout
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

impl AsRef<[f32]> for FeatureVector {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

/// 将检测到的手组合成模型需要的特征向量。
///
/// 没有检测到手时返回 `None`，调用方应直接给出“未检测到”结果。
/// 双手模式下按左右标记分槽，重复标记时后写入者覆盖，
/// 没有标记的手放入右手槽，缺失的槽位补零，输出顺序固定为左手在前。
pub fn build_features(layout: FeatureLayout, hands: &[DetectedHand]) -> Option<FeatureVector> {
  let first = hands.first()?;

  let data: Vec<f32> = match layout {
    FeatureLayout::SingleHand => first.vector.as_slice().to_vec(),
    FeatureLayout::DualHand => {
      let mut left = HandVector::zeros();
      let mut right = HandVector::zeros();
      for hand in hands {
        match hand.handedness {
          Some(Handedness::Left) => left = hand.vector.clone(),
          Some(Handedness::Right) | None => right = hand.vector.clone(),
        }
      }
      debug!(
        "双手特征: 左手{}, 右手{}",
        if left.is_absent() { "缺失" } else { "存在" },
        if right.is_absent() { "缺失" } else { "存在" }
      );
      left
        .as_slice()
        .iter()
        .chain(right.as_slice())
        .copied()
        .collect()
    }
  };

  Some(FeatureVector { layout, data: data.into_boxed_slice() })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn hand(value: f32) -> HandVector {
    HandVector::from_flat(vec![value; HAND_VECTOR_LEN]).unwrap()
  }

  #[test]
  fn points_are_flattened_point_major() {
    let points: Vec<LandmarkPoint> = (0..LANDMARKS_PER_HAND)
      .map(|i| LandmarkPoint::new(i as f32, i as f32 + 0.1, -(i as f32)))
      .collect();
    let vector = HandVector::from_points(&points).unwrap();
    assert_eq!(&vector.as_slice()[..6], &[0.0, 0.1, -0.0, 1.0, 1.1, -1.0]);
    assert_eq!(vector.as_slice().len(), HAND_VECTOR_LEN);
  }

  #[test]
  fn wrong_point_count_is_rejected() {
    let err = HandVector::from_points(&[LandmarkPoint::default(); 20]).unwrap_err();
    assert_eq!(
      err,
      LandmarkError::PointCount {
        expected: 21,
        actual: 20
      }
    );
  }

  #[test]
  fn layout_widths() {
    assert_eq!(FeatureLayout::from_width(63), Some(FeatureLayout::SingleHand));
    assert_eq!(FeatureLayout::from_width(126), Some(FeatureLayout::DualHand));
    assert_eq!(FeatureLayout::from_width(64), None);
    assert_eq!(FeatureLayout::DualHand.width(), 126);
  }

  #[test]
  fn no_hands_yields_nothing() {
    assert!(build_features(FeatureLayout::SingleHand, &[]).is_none());
    assert!(build_features(FeatureLayout::DualHand, &[]).is_none());
  }

  #[test]
  fn single_hand_takes_first_regardless_of_tag() {
    let hands = [
      DetectedHand::new(Some(Handedness::Right), hand(0.2)),
      DetectedHand::new(Some(Handedness::Left), hand(0.7)),
    ];
    let features = build_features(FeatureLayout::SingleHand, &hands).unwrap();
    assert_eq!(features.as_slice(), hand(0.2).as_slice());
  }

  #[test]
  fn left_only_is_padded_on_the_right() {
    let hands = [DetectedHand::new(Some(Handedness::Left), hand(0.5))];
    let features = build_features(FeatureLayout::DualHand, &hands).unwrap();
    let (left, right) = features.as_slice().split_at(HAND_VECTOR_LEN);
    assert_eq!(left, hand(0.5).as_slice());
    assert!(right.iter().all(|v| *v == 0.0));
  }

  #[test]
  fn right_only_is_padded_on_the_left() {
    let hands = [DetectedHand::new(Some(Handedness::Right), hand(0.5))];
    let features = build_features(FeatureLayout::DualHand, &hands).unwrap();
    let (left, right) = features.as_slice().split_at(HAND_VECTOR_LEN);
    assert!(left.iter().all(|v| *v == 0.0));
    assert_eq!(right, hand(0.5).as_slice());
  }

  #[test]
  fn both_hands_are_ordered_left_then_right() {
    let hands = [
      DetectedHand::new(Some(Handedness::Right), hand(0.9)),
      DetectedHand::new(Some(Handedness::Left), hand(0.1)),
    ];
    let features = build_features(FeatureLayout::DualHand, &hands).unwrap();
    assert_eq!(features.as_slice().len(), 126);
    assert_eq!(features.as_slice()[0], 0.1);
    assert_eq!(features.as_slice()[HAND_VECTOR_LEN], 0.9);
  }

  #[test]
  fn duplicated_tag_keeps_last_writer() {
    let hands = [
      DetectedHand::new(Some(Handedness::Left), hand(0.3)),
      DetectedHand::new(Some(Handedness::Left), hand(0.6)),
    ];
    let features = build_features(FeatureLayout::DualHand, &hands).unwrap();
    let (left, right) = features.as_slice().split_at(HAND_VECTOR_LEN);
    assert_eq!(left, hand(0.6).as_slice());
    assert!(right.iter().all(|v| *v == 0.0));
  }

  #[test]
  fn untagged_hand_goes_to_right_slot() {
    let hands = [DetectedHand::new(None, hand(0.4))];
    let features = build_features(FeatureLayout::DualHand, &hands).unwrap();
    assert_eq!(&features.as_slice()[HAND_VECTOR_LEN..], hand(0.4).as_slice());
  }

  #[test]
  fn raw_vector_length_is_checked() {
    assert!(FeatureVector::from_raw(FeatureLayout::SingleHand, vec![0.0; 63]).is_ok());
    assert_eq!(
      FeatureVector::from_raw(FeatureLayout::DualHand, vec![0.0; 63]).unwrap_err(),
      LandmarkError::VectorLength {
        expected: 126,
        actual: 63
      }
    );
  }
}
