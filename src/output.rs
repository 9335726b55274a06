// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/output.rs - 预测结果输出
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

use crate::{FromUrl, FromUrlWithScheme, input::LandmarkSample, service::PredictionResult};

pub trait Render<Sample, Output>: Sized {
  type Error;
  fn render_result(&self, sample: &Sample, result: &Output) -> Result<(), Self::Error>;
}

mod log_output;
pub use self::log_output::{LogOutput, LogOutputError};

mod json_lines_record;
pub use self::json_lines_record::{JsonLinesRecordOutput, JsonLinesRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("日志输出错误: {0}")]
  LogOutputError(#[from] LogOutputError),
  #[error("JSON Lines 记录输出错误: {0}")]
  JsonLinesRecordOutputError(#[from] JsonLinesRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  Log(LogOutput),
  JsonLinesRecord(JsonLinesRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogOutput::SCHEME => Ok(OutputWrapper::Log(LogOutput::from_url(url)?)),
      JsonLinesRecordOutput::SCHEME => Ok(OutputWrapper::JsonLinesRecord(
        JsonLinesRecordOutput::from_url(url)?,
      )),
      scheme => {
        error!("不支持的输出 URI 方案: {}", scheme);
        Err(OutputError::SchemeMismatch(scheme.to_string()))
      }
    }
  }
}

impl Render<LandmarkSample, PredictionResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(
    &self,
    sample: &LandmarkSample,
    result: &PredictionResult,
  ) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(output) => output
        .render_result(sample, result)
        .map_err(OutputError::from),
      OutputWrapper::JsonLinesRecord(output) => output
        .render_result(sample, result)
        .map_err(OutputError::from),
    }
  }
}
