// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/input.rs - 关键点样本输入
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

use crate::{FromUrl, FromUrlWithScheme, service::PredictRequest};

mod csv_landmark;
pub use self::csv_landmark::{CsvLandmarkInput, CsvLandmarkInputError};

mod json_lines;
pub use self::json_lines::{JsonLinesInput, JsonLinesInputError};

/// 一条录制的关键点样本，`expected` 为录制时标注的标签（可选）
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSample {
  pub index: usize,
  pub request: PredictRequest,
  pub expected: Option<String>,
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("CSV 输入错误: {0}")]
  CsvLandmarkInputError(#[from] CsvLandmarkInputError),
  #[error("JSON Lines 输入错误: {0}")]
  JsonLinesInputError(#[from] JsonLinesInputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  CsvLandmark(CsvLandmarkInput),
  JsonLines(JsonLinesInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      CsvLandmarkInput::SCHEME => Ok(InputWrapper::CsvLandmark(CsvLandmarkInput::from_url(url)?)),
      JsonLinesInput::SCHEME => Ok(InputWrapper::JsonLines(JsonLinesInput::from_url(url)?)),
      scheme => {
        error!("不支持的输入 URI 方案: {}", scheme);
        Err(InputError::SchemeMismatch(scheme.to_string()))
      }
    }
  }
}

impl Iterator for InputWrapper {
  type Item = LandmarkSample;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::CsvLandmark(input) => input.next(),
      InputWrapper::JsonLines(input) => input.next(),
    }
  }
}
