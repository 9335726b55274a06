// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/output/log_output.rs - 日志输出
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
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, input::LandmarkSample, output::Render, service::PredictionResult,
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 把每条预测写到日志，`log:?mismatch` 只报告与标注不符的样本
#[derive(Debug, Default)]
pub struct LogOutput {
  mismatch_only: bool,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch);
    }

    Ok(LogOutput {
      mismatch_only: url.query_pairs().any(|(k, _)| k == "mismatch"),
    })
  }
}

impl Render<LandmarkSample, PredictionResult> for LogOutput {
  type Error = LogOutputError;

  fn render_result(
    &self,
    sample: &LandmarkSample,
    result: &PredictionResult,
  ) -> Result<(), Self::Error> {
    match sample.expected.as_deref() {
      Some(expected) if expected != result.prediction => warn!(
        "样本 {}: 预测 {} (置信度 {:.2}, 最佳猜测 {}), 标注为 {}",
        sample.index, result.prediction, result.confidence, result.best_guess, expected
      ),
      _ if self.mismatch_only => {}
      _ => info!(
        "样本 {}: 预测 {} (置信度 {:.2}), 摩斯码 \"{}\"",
        sample.index, result.prediction, result.confidence, result.morse
      ),
    }
    Ok(())
  }
}
