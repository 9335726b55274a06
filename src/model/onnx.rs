// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/model/onnx.rs - ONNX 模型
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
use std::sync::Mutex;

use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{Value, ValueType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  landmark::FeatureLayout,
  model::{ClassDistribution, Classifier, ModelError},
};

#[derive(Error, Debug)]
pub enum OnnxModelError {
  #[error("ONNX Runtime 错误: {0}")]
  RuntimeError(#[from] ort::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("推理会话锁已失效")]
  SessionPoisoned,
}

/// 取张量最后一维作为宽度，动态维度视为无效
fn last_dimension(value_type: &ValueType) -> Option<usize> {
  match value_type {
    ValueType::Tensor { shape, .. } => shape
      .last()
      .copied()
      .filter(|d| *d > 0)
      .map(|d| d as usize),
    _ => None,
  }
}

/// ONNX Runtime 分类器，运行需要可变会话，用互斥锁包装后共享
pub struct OnnxModel {
  session: Mutex<Session>,
  layout: FeatureLayout,
  num_classes: usize,
  input_name: String,
  output_name: String,
}

impl Classifier for OnnxModel {
  fn layout(&self) -> FeatureLayout {
    self.layout
  }

  fn num_classes(&self) -> usize {
    self.num_classes
  }

  fn forward(&self, features: &[f32]) -> Result<ClassDistribution, ModelError> {
    let input = Value::from_array((vec![1_usize, features.len()], features.to_vec()))
      .map_err(OnnxModelError::from)?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| OnnxModelError::SessionPoisoned)?;
    let outputs = session
      .run(ort::inputs![self.input_name.as_str() => &input])
      .map_err(OnnxModelError::from)?;
    let (_, probabilities) = outputs[self.output_name.as_str()]
      .try_extract_tensor::<f32>()
      .map_err(OnnxModelError::from)?;

    Ok(probabilities.to_vec().into())
  }
}

pub struct OnnxModelBuilder {
  model_path: PathBuf,
}

impl FromUrlWithScheme for OnnxModelBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxModelBuilder {
  type Error = OnnxModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(OnnxModelBuilder {
      model_path: PathBuf::from(url.path()),
    })
  }
}

impl OnnxModelBuilder {
  pub fn build(self) -> Result<OnnxModel, OnnxModelError> {
    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()?.commit_from_file(&self.model_path)?;

    let input = session
      .inputs
      .first()
      .ok_or_else(|| OnnxModelError::ModelInvalid("模型没有输入".to_string()))?;
    let input_width = last_dimension(&input.input_type)
      .ok_or_else(|| OnnxModelError::ModelInvalid("无法确定输入宽度".to_string()))?;
    let layout = FeatureLayout::from_width(input_width).ok_or_else(|| {
      error!("模型输入宽度为 {}, 仅支持 63 或 126", input_width);
      OnnxModelError::ModelInvalid(format!("不支持的输入宽度 {}", input_width))
    })?;

    let output = session
      .outputs
      .iter()
      .find(|output| {
        matches!(
          output.output_type,
          ValueType::Tensor {
            ty: TensorElementType::Float32,
            ..
          }
        )
      })
      .or_else(|| session.outputs.first())
      .ok_or_else(|| OnnxModelError::ModelInvalid("模型没有输出".to_string()))?;
    let num_classes = last_dimension(&output.output_type)
      .ok_or_else(|| OnnxModelError::ModelInvalid("无法确定类别数".to_string()))?;

    let input_name = input.name.clone();
    let output_name = output.name.clone();
    debug!("模型输入: {}, 输出: {}", input_name, output_name);
    info!("模型加载完成, 输入布局 {}, 类别数 {}", layout, num_classes);

    Ok(OnnxModel {
      session: Mutex::new(session),
      layout,
      num_classes,
      input_name,
      output_name,
    })
  }
}
