// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/train.rs - 离线训练
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

use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  dataset::{Dataset, DatasetError, LabelEncoder, train_test_split},
  label::LabelFile,
  model::{Activation, DenseArtifact, DenseLayerSpec},
};

const ADAM_BETA1: f32 = 0.9;
const ADAM_BETA2: f32 = 0.999;
const ADAM_EPSILON: f32 = 1e-7;
const LOG_EPSILON: f32 = 1e-7;

#[derive(Error, Debug)]
pub enum TrainError {
  #[error("数据集错误: {0}")]
  DatasetError(#[from] DatasetError),
  #[error("至少需要两个类别, 实际只有 {0} 个")]
  TooFewClasses(usize),
  #[error("训练参数无效: {0}")]
  InvalidConfig(String),
}

/// 训练参数
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
  pub hidden_layers: Vec<usize>,
  pub epochs: usize,
  pub batch_size: usize,
  pub learning_rate: f32,
  pub test_fraction: f32,
  pub seed: u64,
}

impl Default for TrainConfig {
  fn default() -> Self {
    Self {
      hidden_layers: vec![128, 64],
      epochs: 25,
      batch_size: 32,
      learning_rate: 1e-3,
      test_fraction: 0.2,
      seed: 42,
    }
  }
}

impl TrainConfig {
  fn validate(&self) -> Result<(), TrainError> {
    if self.epochs == 0 || self.batch_size == 0 {
      return Err(TrainError::InvalidConfig(
        "epochs 与 batch_size 必须大于 0".to_string(),
      ));
    }
    if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
      return Err(TrainError::InvalidConfig(format!(
        "学习率 {} 无效",
        self.learning_rate
      )));
    }
    if !(0.0..1.0).contains(&self.test_fraction) {
      return Err(TrainError::InvalidConfig(format!(
        "测试集比例 {} 必须在 [0, 1) 之间",
        self.test_fraction
      )));
    }
    if self.hidden_layers.contains(&0) {
      return Err(TrainError::InvalidConfig("隐层宽度不能为 0".to_string()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochStats {
  pub epoch: usize,
  pub loss: f32,
  pub train_accuracy: f32,
  pub test_accuracy: Option<f32>,
}

/// 训练产物：模型文件、类别表与每轮统计
#[derive(Debug, Clone)]
pub struct TrainOutcome {
  pub artifact: DenseArtifact,
  pub classes: Vec<String>,
  pub history: Vec<EpochStats>,
  pub train_len: usize,
  pub test_len: usize,
}

impl TrainOutcome {
  pub fn final_stats(&self) -> Option<&EpochStats> {
    self.history.last()
  }

  /// 与模型类别顺序一致的标签文件
  pub fn label_file(&self) -> LabelFile {
    LabelFile::new(self.classes.clone())
  }
}

struct Layer {
  weights: Array2<f32>,
  bias: Array1<f32>,
  m_weights: Array2<f32>,
  v_weights: Array2<f32>,
  m_bias: Array1<f32>,
  v_bias: Array1<f32>,
}

impl Layer {
  /// Xavier 均匀分布初始化
  fn new(input: usize, output: usize, rng: &mut StdRng) -> Self {
    let limit = (6.0 / (input + output) as f32).sqrt();
    Self {
      weights: Array2::from_shape_fn((input, output), |_| rng.random_range(-limit..limit)),
      bias: Array1::zeros(output),
      m_weights: Array2::zeros((input, output)),
      v_weights: Array2::zeros((input, output)),
      m_bias: Array1::zeros(output),
      v_bias: Array1::zeros(output),
    }
  }
}

fn adam_step<D: Dimension>(
  param: &mut Array<f32, D>,
  m: &mut Array<f32, D>,
  v: &mut Array<f32, D>,
  grad: &Array<f32, D>,
  learning_rate: f32,
  step: i32,
) {
  let correction1 = 1.0 - ADAM_BETA1.powi(step);
  let correction2 = 1.0 - ADAM_BETA2.powi(step);
  Zip::from(param)
    .and(m)
    .and(v)
    .and(grad)
    .for_each(|p, m, v, &g| {
      *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
      *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
      let m_hat = *m / correction1;
      let v_hat = *v / correction2;
      *p -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
    });
}

fn softmax_rows(mut z: Array2<f32>) -> Array2<f32> {
  for mut row in z.rows_mut() {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    row.mapv_inplace(|v| (v - max).exp());
    let sum = row.sum();
    if sum > 0.0 {
      row /= sum;
    }
  }
  z
}

/// 隐层 relu，输出层 softmax
struct Network {
  input_width: usize,
  layers: Vec<Layer>,
  step: i32,
}

impl Network {
  fn new(input_width: usize, hidden: &[usize], classes: usize, rng: &mut StdRng) -> Self {
    let mut widths = vec![input_width];
    widths.extend_from_slice(hidden);
    widths.push(classes);

    let layers = widths
      .windows(2)
      .map(|pair| Layer::new(pair[0], pair[1], rng))
      .collect();
    Self {
      input_width,
      layers,
      step: 0,
    }
  }

  /// 返回每一层的激活值，第一个元素为输入本身
  fn forward(&self, x: &Array2<f32>) -> Vec<Array2<f32>> {
    let mut activations = Vec::with_capacity(self.layers.len() + 1);
    activations.push(x.clone());
    let last = self.layers.len() - 1;
    for (index, layer) in self.layers.iter().enumerate() {
      let z = activations[index].dot(&layer.weights) + &layer.bias;
      let a = if index == last {
        softmax_rows(z)
      } else {
        z.mapv(|v| v.max(0.0))
      };
      activations.push(a);
    }
    activations
  }

  /// 一个小批次的前向与反向传播，返回平均交叉熵
  fn train_batch(&mut self, x: &Array2<f32>, y: &Array2<f32>, learning_rate: f32) -> f32 {
    let activations = self.forward(x);
    let n = x.nrows() as f32;
    let probabilities = &activations[self.layers.len()];

    let loss = -(y * &probabilities.mapv(|p| (p + LOG_EPSILON).ln())).sum() / n;

    self.step += 1;
    let mut delta = (probabilities - y) / n;
    for index in (0..self.layers.len()).rev() {
      let grad_weights = activations[index].t().dot(&delta);
      let grad_bias = delta.sum_axis(Axis(0));

      let next_delta = if index > 0 {
        let mut next = delta.dot(&self.layers[index].weights.t());
        next.zip_mut_with(&activations[index], |d, &a| {
          if a <= 0.0 {
            *d = 0.0;
          }
        });
        Some(next)
      } else {
        None
      };

      let step = self.step;
      let layer = &mut self.layers[index];
      adam_step(
        &mut layer.weights,
        &mut layer.m_weights,
        &mut layer.v_weights,
        &grad_weights,
        learning_rate,
        step,
      );
      adam_step(
        &mut layer.bias,
        &mut layer.m_bias,
        &mut layer.v_bias,
        &grad_bias,
        learning_rate,
        step,
      );

      if let Some(next) = next_delta {
        delta = next;
      }
    }

    loss
  }

  fn predict(&self, x: &Array2<f32>) -> Vec<usize> {
    let activations = self.forward(x);
    activations[self.layers.len()]
      .rows()
      .into_iter()
      .map(|row| {
        let mut best = 0;
        for (index, &p) in row.iter().enumerate() {
          if p > row[best] {
            best = index;
          }
        }
        best
      })
      .collect()
  }

  fn accuracy(&self, x: &Array2<f32>, targets: &[usize]) -> f32 {
    if targets.is_empty() {
      return 0.0;
    }
    let correct = self
      .predict(x)
      .iter()
      .zip(targets)
      .filter(|(p, t)| p == t)
      .count();
    correct as f32 / targets.len() as f32
  }

  fn to_artifact(&self) -> DenseArtifact {
    let last = self.layers.len() - 1;
    DenseArtifact {
      input_width: self.input_width,
      layers: self
        .layers
        .iter()
        .enumerate()
        .map(|(index, layer)| DenseLayerSpec {
          weights: layer.weights.rows().into_iter().map(|r| r.to_vec()).collect(),
          bias: layer.bias.to_vec(),
          activation: if index == last {
            Activation::Softmax
          } else {
            Activation::Relu
          },
        })
        .collect(),
    }
  }
}

fn one_hot(targets: &[usize], classes: usize) -> Array2<f32> {
  let mut y = Array2::zeros((targets.len(), classes));
  for (row, &target) in targets.iter().enumerate() {
    y[[row, target]] = 1.0;
  }
  y
}

/// 在清洗后的数据集上训练全连接分类器
pub fn fit(dataset: &Dataset, config: &TrainConfig) -> Result<TrainOutcome, TrainError> {
  config.validate()?;
  if dataset.is_empty() {
    return Err(DatasetError::Empty {
      dropped: dataset.dropped(),
    }
    .into());
  }

  let encoder = LabelEncoder::fit(dataset.samples().iter().map(|s| s.label.as_str()));
  if encoder.len() < 2 {
    return Err(TrainError::TooFewClasses(encoder.len()));
  }
  info!("类别数: {}, 类别: {:?}", encoder.len(), encoder.classes());

  let targets = dataset
    .samples()
    .iter()
    .map(|s| encoder.transform(&s.label))
    .collect::<Option<Vec<usize>>>()
    .ok_or_else(|| TrainError::InvalidConfig("标签编码失败".to_string()))?;

  let width = dataset.layout().width();
  let flat: Vec<f32> = dataset
    .samples()
    .iter()
    .flat_map(|s| s.features.iter().copied())
    .collect();
  let x_all = Array2::from_shape_vec((dataset.len(), width), flat)
    .map_err(|e| TrainError::InvalidConfig(format!("特征矩阵形状错误: {}", e)))?;

  let (train_idx, test_idx) = train_test_split(dataset.len(), config.test_fraction, config.seed);
  let x_train = x_all.select(Axis(0), &train_idx);
  let x_test = x_all.select(Axis(0), &test_idx);
  let t_train: Vec<usize> = train_idx.iter().map(|&i| targets[i]).collect();
  let t_test: Vec<usize> = test_idx.iter().map(|&i| targets[i]).collect();
  let y_train = one_hot(&t_train, encoder.len());

  let mut rng = StdRng::seed_from_u64(config.seed);
  let mut network = Network::new(width, &config.hidden_layers, encoder.len(), &mut rng);
  info!(
    "开始训练: 训练集 {} 条, 测试集 {} 条, 网络 {} -> {:?} -> {}",
    train_idx.len(),
    test_idx.len(),
    width,
    config.hidden_layers,
    encoder.len()
  );

  let mut order: Vec<usize> = (0..train_idx.len()).collect();
  let mut history = Vec::with_capacity(config.epochs);
  for epoch in 1..=config.epochs {
    order.shuffle(&mut rng);
    let mut loss_sum = 0.0;
    for batch in order.chunks(config.batch_size) {
      let xb = x_train.select(Axis(0), batch);
      let yb = y_train.select(Axis(0), batch);
      loss_sum += network.train_batch(&xb, &yb, config.learning_rate) * batch.len() as f32;
    }

    let stats = EpochStats {
      epoch,
      loss: loss_sum / train_idx.len() as f32,
      train_accuracy: network.accuracy(&x_train, &t_train),
      test_accuracy: (!t_test.is_empty()).then(|| network.accuracy(&x_test, &t_test)),
    };
    match stats.test_accuracy {
      Some(test) => info!(
        "第 {}/{} 轮: loss {:.4}, 训练准确率 {:.2}%, 测试准确率 {:.2}%",
        epoch,
        config.epochs,
        stats.loss,
        stats.train_accuracy * 100.0,
        test * 100.0
      ),
      None => info!(
        "第 {}/{} 轮: loss {:.4}, 训练准确率 {:.2}%",
        epoch,
        config.epochs,
        stats.loss,
        stats.train_accuracy * 100.0
      ),
    }
    history.push(stats);
  }
  debug!("Adam 更新步数: {}", network.step);

  Ok(TrainOutcome {
    artifact: network.to_artifact(),
    classes: encoder.classes().to_vec(),
    history,
    train_len: train_idx.len(),
    test_len: test_idx.len(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{Classifier, DenseModel};

  fn separable_csv() -> String {
    let mut rows = Vec::new();
    for i in 0..20 {
      let jitter = i as f32 * 0.002;
      for (center, label) in [(0.1, "NO"), (0.9, "YES")] {
        let mut fields: Vec<String> = (0..63).map(|_| (center + jitter).to_string()).collect();
        fields.push(label.to_string());
        rows.push(fields.join(","));
      }
    }
    rows.join("\n")
  }

  fn small_config() -> TrainConfig {
    TrainConfig {
      hidden_layers: vec![16],
      epochs: 60,
      batch_size: 8,
      learning_rate: 0.01,
      ..TrainConfig::default()
    }
  }

  #[test]
  fn learns_a_separable_dataset() {
    let dataset = Dataset::from_reader(separable_csv().as_bytes(), None).unwrap();
    let outcome = fit(&dataset, &small_config()).unwrap();

    assert_eq!(outcome.classes, vec!["NO".to_string(), "YES".to_string()]);
    assert_eq!(outcome.train_len + outcome.test_len, 40);
    assert_eq!(outcome.test_len, 8);
    let last = outcome.final_stats().unwrap();
    assert_eq!(last.train_accuracy, 1.0);
    assert!(last.loss < outcome.history[0].loss);

    let model = DenseModel::from_artifact(outcome.artifact.clone()).unwrap();
    let yes = model.infer(&[0.9; 63]).unwrap();
    assert!(yes.as_slice()[1] > yes.as_slice()[0]);
    let no = model.infer(&[0.1; 63]).unwrap();
    assert!(no.as_slice()[0] > no.as_slice()[1]);
  }

  #[test]
  fn training_is_reproducible_with_fixed_seed() {
    let dataset = Dataset::from_reader(separable_csv().as_bytes(), None).unwrap();
    let config = TrainConfig {
      epochs: 3,
      ..small_config()
    };
    let a = fit(&dataset, &config).unwrap();
    let b = fit(&dataset, &config).unwrap();
    assert_eq!(a.artifact, b.artifact);
    assert_eq!(a.history, b.history);
  }

  #[test]
  fn single_class_is_rejected() {
    let row: Vec<String> = (0..63)
      .map(|_| "0.5".to_string())
      .chain(["YES".to_string()])
      .collect();
    let csv = [row.join(","), row.join(",")].join("\n");
    let dataset = Dataset::from_reader(csv.as_bytes(), None).unwrap();
    assert!(matches!(
      fit(&dataset, &TrainConfig::default()),
      Err(TrainError::TooFewClasses(1))
    ));
  }

  #[test]
  fn invalid_config_is_rejected() {
    let dataset = Dataset::from_reader(separable_csv().as_bytes(), None).unwrap();
    let config = TrainConfig {
      test_fraction: 1.0,
      ..TrainConfig::default()
    };
    assert!(matches!(
      fit(&dataset, &config),
      Err(TrainError::InvalidConfig(_))
    ));
  }
}
