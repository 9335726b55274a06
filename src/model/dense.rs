// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/model/dense.rs - 全连接网络模型
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

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  landmark::FeatureLayout,
  model::{ClassDistribution, Classifier, ModelError},
};

#[derive(Error, Debug)]
pub enum DenseModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型文件解析错误: {0}")]
  ModelParseError(#[from] serde_json::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
  Relu,
  Softmax,
  Linear,
}

/// 单层参数，`weights[i][o]` 为输入 i 到输出 o 的权重
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayerSpec {
  pub weights: Vec<Vec<f32>>,
  pub bias: Vec<f32>,
  pub activation: Activation,
}

/// 模型文件格式（JSON）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseArtifact {
  pub input_width: usize,
  pub layers: Vec<DenseLayerSpec>,
}

impl DenseArtifact {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, DenseModelError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DenseModelError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string(self)?)?;
    info!("保存模型文件到: {}", path.display());
    Ok(())
  }
}

struct DenseLayer {
  weights: Array2<f32>,
  bias: Array1<f32>,
  activation: Activation,
}

impl DenseLayer {
  fn from_spec(index: usize, spec: DenseLayerSpec) -> Result<Self, DenseModelError> {
    let rows = spec.weights.len();
    let cols = spec.bias.len();
    if rows == 0 || cols == 0 {
      return Err(DenseModelError::ModelInvalid(format!("第 {} 层为空", index)));
    }
    if let Some(row) = spec.weights.iter().find(|row| row.len() != cols) {
      return Err(DenseModelError::ModelInvalid(format!(
        "第 {} 层权重列数 {} 与偏置长度 {} 不一致",
        index,
        row.len(),
        cols
      )));
    }

    let flat: Vec<f32> = spec.weights.into_iter().flatten().collect();
    let weights = Array2::from_shape_vec((rows, cols), flat)
      .map_err(|e| DenseModelError::ModelInvalid(format!("第 {} 层形状错误: {}", index, e)))?;

    Ok(Self {
      weights,
      bias: Array1::from(spec.bias),
      activation: spec.activation,
    })
  }

  fn apply(&self, input: &Array1<f32>) -> Array1<f32> {
    let z = input.dot(&self.weights) + &self.bias;
    match self.activation {
      Activation::Relu => z.mapv(|v| v.max(0.0)),
      Activation::Softmax => softmax(z),
      Activation::Linear => z,
    }
  }
}

pub(crate) fn softmax(z: Array1<f32>) -> Array1<f32> {
  let max = z.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let exp = z.mapv(|v| (v - max).exp());
  let sum = exp.sum();
  if sum > 0.0 && sum.is_finite() {
    exp / sum
  } else {
    exp
  }
}

/// 纯 Rust 实现的全连接分类器
pub struct DenseModel {
  layout: FeatureLayout,
  layers: Box<[DenseLayer]>,
  num_classes: usize,
}

impl DenseModel {
  pub fn from_artifact(artifact: DenseArtifact) -> Result<Self, DenseModelError> {
    let layout = FeatureLayout::from_width(artifact.input_width).ok_or_else(|| {
      DenseModelError::ModelInvalid(format!(
        "输入宽度必须为 63 或 126, 实际为 {}",
        artifact.input_width
      ))
    })?;

    if artifact.layers.is_empty() {
      return Err(DenseModelError::ModelInvalid("模型没有任何层".to_string()));
    }

    let mut layers = Vec::with_capacity(artifact.layers.len());
    let mut width = artifact.input_width;
    for (index, spec) in artifact.layers.into_iter().enumerate() {
      let layer = DenseLayer::from_spec(index, spec)?;
      if layer.weights.nrows() != width {
        error!(
          "第 {} 层输入维度为 {}, 上一层输出为 {}",
          index,
          layer.weights.nrows(),
          width
        );
        return Err(DenseModelError::ModelInvalid(format!(
          "第 {} 层输入维度 {} 与上一层输出 {} 不一致",
          index,
          layer.weights.nrows(),
          width
        )));
      }
      width = layer.weights.ncols();
      layers.push(layer);
    }

    debug!("模型层数: {}, 输出类别数: {}", layers.len(), width);

    Ok(Self {
      layout,
      layers: layers.into_boxed_slice(),
      num_classes: width,
    })
  }
}

impl Classifier for DenseModel {
  fn layout(&self) -> FeatureLayout {
    self.layout
  }

  fn num_classes(&self) -> usize {
    self.num_classes
  }

  fn forward(&self, features: &[f32]) -> Result<ClassDistribution, ModelError> {
    let mut x = Array1::from(features.to_vec());
    for layer in self.layers.iter() {
      x = layer.apply(&x);
    }
    Ok(x.to_vec().into())
  }
}

pub struct DenseModelBuilder {
  model_path: PathBuf,
}

impl FromUrlWithScheme for DenseModelBuilder {
  const SCHEME: &'static str = "dense";
}

impl FromUrl for DenseModelBuilder {
  type Error = DenseModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DenseModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(DenseModelBuilder {
      model_path: PathBuf::from(url.path()),
    })
  }
}

impl DenseModelBuilder {
  pub fn with_path(path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: path.into(),
    }
  }

  pub fn build(self) -> Result<DenseModel, DenseModelError> {
    info!("加载模型文件: {}", self.model_path.display());
    let artifact = DenseArtifact::load(&self.model_path)?;
    let model = DenseModel::from_artifact(artifact)?;
    info!(
      "模型加载完成, 输入布局 {}, 类别数 {}",
      model.layout, model.num_classes
    );
    Ok(model)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn constant_artifact(width: usize, output: Vec<f32>, activation: Activation) -> DenseArtifact {
    DenseArtifact {
      input_width: width,
      layers: vec![DenseLayerSpec {
        weights: vec![vec![0.0; output.len()]; width],
        bias: output,
        activation,
      }],
    }
  }

  #[test]
  fn linear_layer_returns_bias_for_zero_weights() {
    let model =
      DenseModel::from_artifact(constant_artifact(63, vec![0.1, 0.9], Activation::Linear))
        .unwrap();
    assert_eq!(model.layout(), FeatureLayout::SingleHand);
    assert_eq!(model.num_classes(), 2);
    let out = model.infer(&[0.5; 63]).unwrap();
    assert_eq!(out.as_slice(), &[0.1, 0.9]);
  }

  #[test]
  fn softmax_output_sums_to_one() {
    let model = DenseModel::from_artifact(constant_artifact(
      126,
      vec![1.0, 2.0, 3.0],
      Activation::Softmax,
    ))
    .unwrap();
    let out = model.infer(&[0.0; 126]).unwrap();
    let sum: f32 = out.as_slice().iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);
    assert!(out.as_slice()[2] > out.as_slice()[1]);
  }

  #[test]
  fn hidden_relu_layer_is_applied() {
    let artifact = DenseArtifact {
      input_width: 63,
      layers: vec![
        DenseLayerSpec {
          weights: vec![vec![1.0]; 63],
          bias: vec![-100.0],
          activation: Activation::Relu,
        },
        DenseLayerSpec {
          weights: vec![vec![1.0, 1.0]],
          bias: vec![0.0, 0.5],
          activation: Activation::Linear,
        },
      ],
    };
    let model = DenseModel::from_artifact(artifact).unwrap();
    // 隐层被 relu 截断为 0
    assert_eq!(model.infer(&[1.0; 63]).unwrap().as_slice(), &[0.0, 0.5]);
  }

  #[test]
  fn wrong_input_width_is_a_shape_error() {
    let model =
      DenseModel::from_artifact(constant_artifact(63, vec![1.0], Activation::Linear)).unwrap();
    let err = model.infer(&[0.0; 126]).unwrap_err();
    assert!(matches!(
      err,
      ModelError::InputShape(crate::model::InputShapeError {
        expected: 63,
        actual: 126
      })
    ));
  }

  #[test]
  fn invalid_artifacts_are_rejected() {
    assert!(
      DenseModel::from_artifact(constant_artifact(64, vec![1.0], Activation::Linear)).is_err()
    );

    let mismatched = DenseArtifact {
      input_width: 63,
      layers: vec![
        DenseLayerSpec {
          weights: vec![vec![0.0; 4]; 63],
          bias: vec![0.0; 4],
          activation: Activation::Relu,
        },
        DenseLayerSpec {
          weights: vec![vec![0.0; 2]; 5],
          bias: vec![0.0; 2],
          activation: Activation::Softmax,
        },
      ],
    };
    assert!(matches!(
      DenseModel::from_artifact(mismatched),
      Err(DenseModelError::ModelInvalid(_))
    ));

    let ragged = DenseArtifact {
      input_width: 63,
      layers: vec![DenseLayerSpec {
        weights: vec![vec![0.0; 2]; 63].into_iter().chain([vec![0.0]]).collect(),
        bias: vec![0.0; 2],
        activation: Activation::Linear,
      }],
    };
    assert!(DenseModel::from_artifact(ragged).is_err());
  }

  #[test]
  fn builder_requires_dense_scheme() {
    let url = Url::parse("onnx:///tmp/model.onnx").unwrap();
    assert!(matches!(
      DenseModelBuilder::from_url(&url),
      Err(DenseModelError::ModelPathError(_))
    ));
  }

  #[test]
  fn artifact_file_round_trip_loads_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    constant_artifact(63, vec![0.2, 0.8], Activation::Linear)
      .save(&path)
      .unwrap();
    let model = DenseModelBuilder::with_path(&path).build().unwrap();
    assert_eq!(model.infer(&[0.0; 63]).unwrap().as_slice(), &[0.2, 0.8]);
  }
}
