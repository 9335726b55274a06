// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/service.rs - 推理服务边界
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

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  decision::{Decision, DecisionConfig},
  landmark::{DetectedHand, FeatureLayout, Handedness, HandVector, build_features},
  model::Classifier,
  morse,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
  #[error("标签数量 {labels} 与模型类别数 {classes} 不一致")]
  VocabularyMismatch { labels: usize, classes: usize },
}

/// 返回给调用方的预测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
  pub prediction: String,
  pub confidence: f32,
  pub morse: String,
  pub best_guess: String,
}

/// 带左右手标记的单手输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandPayload {
  #[serde(default)]
  pub handedness: Option<Handedness>,
  pub landmarks: Vec<f32>,
}

/// 预测请求，`landmarks` 为已经拼好的特征向量，`hands` 为逐手输入。
///
/// 两者同时给出时只使用 `landmarks`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub landmarks: Option<Vec<f32>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hands: Option<Vec<HandPayload>>,
}

impl PredictRequest {
  pub fn from_landmarks(landmarks: Vec<f32>) -> Self {
    Self {
      landmarks: Some(landmarks),
      hands: None,
    }
  }
}

fn round2(value: f32) -> f32 {
  (value * 100.0).round() / 100.0
}

/// 推理服务：特征组装 → 分类 → 判定 → 摩斯编码。
///
/// 只持有只读的模型与配置，可以随意克隆到各个请求中。
#[derive(Clone)]
pub struct SignService {
  classifier: Arc<dyn Classifier>,
  config: Arc<DecisionConfig>,
}

impl SignService {
  pub fn new(
    classifier: Arc<dyn Classifier>,
    config: Arc<DecisionConfig>,
  ) -> Result<Self, ServiceError> {
    let labels = config.vocabulary().len();
    let classes = classifier.num_classes();
    if labels != classes {
      error!("标签数量 {} 与模型类别数 {} 不一致", labels, classes);
      return Err(ServiceError::VocabularyMismatch { labels, classes });
    }

    info!(
      "推理服务就绪: 输入布局 {}, 类别数 {}, 阈值 {:.2}",
      classifier.layout(),
      classes,
      config.threshold()
    );
    Ok(Self { classifier, config })
  }

  pub fn layout(&self) -> FeatureLayout {
    self.classifier.layout()
  }

  pub fn config(&self) -> &DecisionConfig {
    &self.config
  }

  /// 输入无效时的结果
  pub fn no_detection(&self) -> PredictionResult {
    PredictionResult {
      prediction: self.config.sentinel().to_string(),
      confidence: 0.0,
      morse: String::new(),
      best_guess: self.config.sentinel().to_string(),
    }
  }

  fn from_decision(&self, decision: Decision) -> PredictionResult {
    let morse = morse::encode_label(&decision.final_label, self.config.sentinel());
    PredictionResult {
      prediction: decision.final_label,
      confidence: round2(decision.confidence),
      morse,
      best_guess: decision.best_guess,
    }
  }

  /// 对扁平特征向量做预测，长度不符时返回未检测到，不报错
  pub fn predict(&self, landmarks: &[f32]) -> PredictionResult {
    let expected = self.layout().width();
    if landmarks.len() != expected {
      debug!("特征长度 {} 与期望 {} 不符", landmarks.len(), expected);
      return self.no_detection();
    }

    match self.classifier.infer(landmarks) {
      Ok(distribution) => self.from_decision(self.config.resolve(distribution.as_slice())),
      Err(e) => {
        error!("模型推理失败: {}", e);
        self.no_detection()
      }
    }
  }

  /// 对逐手输入做预测
  pub fn predict_hands(&self, hands: &[DetectedHand]) -> PredictionResult {
    match build_features(self.layout(), hands) {
      Some(features) => self.predict(features.as_slice()),
      None => self.no_detection(),
    }
  }

  pub fn predict_request(&self, request: &PredictRequest) -> PredictionResult {
    if let Some(landmarks) = &request.landmarks {
      if request.hands.is_some() {
        debug!("请求同时包含 landmarks 与 hands, 忽略 hands");
      }
      return self.predict(landmarks);
    }

    let Some(payloads) = &request.hands else {
      return self.no_detection();
    };

    let mut hands = Vec::with_capacity(payloads.len());
    for payload in payloads {
      match HandVector::from_flat(payload.landmarks.clone()) {
        Ok(vector) => hands.push(DetectedHand::new(payload.handedness, vector)),
        Err(e) => {
          debug!("手部输入无效: {}", e);
          return self.no_detection();
        }
      }
    }
    self.predict_hands(&hands)
  }
}
