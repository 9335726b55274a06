// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/model.rs - 分类模型
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

use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{FromUrl, landmark::FeatureLayout};

/// 每个类别下标一个概率，与训练时的标签表对齐
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassDistribution {
  probabilities: Box<[f32]>,
}

impl ClassDistribution {
  pub fn as_slice(&self) -> &[f32] {
    &self.probabilities
  }

  pub fn len(&self) -> usize {
    self.probabilities.len()
  }

  pub fn is_empty(&self) -> bool {
    self.probabilities.is_empty()
  }
}

impl From<Vec<f32>> for ClassDistribution {
  fn from(probabilities: Vec<f32>) -> Self {
    Self {
      probabilities: probabilities.into_boxed_slice(),
    }
  }
}

impl AsRef<[f32]> for ClassDistribution {
  fn as_ref(&self) -> &[f32] {
    &self.probabilities
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("输入维度不匹配: 期望 {expected}, 实际 {actual}")]
pub struct InputShapeError {
  pub expected: usize,
  pub actual: usize,
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("{0}")]
  InputShape(#[from] InputShapeError),
  #[cfg(feature = "model_dense")]
  #[error("Dense 模型错误: {0}")]
  Dense(#[from] DenseModelError),
  #[cfg(feature = "model_onnx")]
  #[error("ONNX 模型错误: {0}")]
  Onnx(#[from] OnnxModelError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 训练好的分类器，加载后权重不可变，可在多个请求间共享
pub trait Classifier: Send + Sync {
  /// 模型声明的输入布局
  fn layout(&self) -> FeatureLayout;
  fn num_classes(&self) -> usize;
  /// 前向计算，调用方保证输入宽度正确
  fn forward(&self, features: &[f32]) -> Result<ClassDistribution, ModelError>;

  fn infer(&self, features: &[f32]) -> Result<ClassDistribution, ModelError> {
    let expected = self.layout().width();
    if features.len() != expected {
      return Err(
        InputShapeError {
          expected,
          actual: features.len(),
        }
        .into(),
      );
    }
    self.forward(features)
  }
}

#[cfg(feature = "model_dense")]
mod dense;
#[cfg(feature = "model_dense")]
pub use self::dense::{
  Activation, DenseArtifact, DenseLayerSpec, DenseModel, DenseModelBuilder, DenseModelError,
};

#[cfg(feature = "model_onnx")]
mod onnx;
#[cfg(feature = "model_onnx")]
pub use self::onnx::{OnnxModel, OnnxModelBuilder, OnnxModelError};

/// 按 URI 方案选择模型后端
pub enum ModelWrapper {
  #[cfg(feature = "model_dense")]
  Dense(DenseModel),
  #[cfg(feature = "model_onnx")]
  Onnx(OnnxModel),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "model_dense")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == DenseModelBuilder::SCHEME {
        let model = DenseModelBuilder::from_url(url)?.build()?;
        return Ok(ModelWrapper::Dense(model));
      }
    }
    #[cfg(feature = "model_onnx")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == OnnxModelBuilder::SCHEME {
        let model = OnnxModelBuilder::from_url(url)?.build()?;
        return Ok(ModelWrapper::Onnx(model));
      }
    }
    error!("不支持的模型 URI 方案: {}", url.scheme());
    Err(ModelError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Classifier for ModelWrapper {
  fn layout(&self) -> FeatureLayout {
    match self {
      #[cfg(feature = "model_dense")]
      ModelWrapper::Dense(model) => model.layout(),
      #[cfg(feature = "model_onnx")]
      ModelWrapper::Onnx(model) => model.layout(),
    }
  }

  fn num_classes(&self) -> usize {
    match self {
      #[cfg(feature = "model_dense")]
      ModelWrapper::Dense(model) => model.num_classes(),
      #[cfg(feature = "model_onnx")]
      ModelWrapper::Onnx(model) => model.num_classes(),
    }
  }

  fn forward(&self, features: &[f32]) -> Result<ClassDistribution, ModelError> {
    match self {
      #[cfg(feature = "model_dense")]
      ModelWrapper::Dense(model) => model.forward(features),
      #[cfg(feature = "model_onnx")]
      ModelWrapper::Onnx(model) => model.forward(features),
    }
  }
}
