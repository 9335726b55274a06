// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/output/json_lines_record.rs - JSON Lines 记录输出
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

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, input::LandmarkSample, output::Render, service::PredictionResult,
};

#[derive(Error, Debug)]
pub enum JsonLinesRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("记录文件锁已失效")]
  WriterPoisoned,
}

#[derive(Debug, Serialize)]
struct Record<'a> {
  timestamp: DateTime<Utc>,
  index: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  expected: Option<&'a str>,
  #[serde(flatten)]
  result: &'a PredictionResult,
}

/// 追加写入 JSON Lines 文件，每条预测一行。
///
/// 默认只记录有摩斯码输出的结果，带 `always` 参数时全部记录。
pub struct JsonLinesRecordOutput {
  path: PathBuf,
  writer: Mutex<BufWriter<File>>,
  always: bool,
}

impl FromUrlWithScheme for JsonLinesRecordOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesRecordOutput {
  type Error = JsonLinesRecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonLinesRecordOutputError::SchemeMismatch);
    }

    let path = PathBuf::from(url.path());
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    info!("预测记录写入: {}", path.display());

    Ok(JsonLinesRecordOutput {
      path,
      writer: Mutex::new(BufWriter::new(file)),
      always: url.query_pairs().any(|(k, _)| k == "always"),
    })
  }
}

impl JsonLinesRecordOutput {
  pub fn path(&self) -> &PathBuf {
    &self.path
  }
}

impl Render<LandmarkSample, PredictionResult> for JsonLinesRecordOutput {
  type Error = JsonLinesRecordOutputError;

  fn render_result(
    &self,
    sample: &LandmarkSample,
    result: &PredictionResult,
  ) -> Result<(), Self::Error> {
    if !self.always && result.morse.is_empty() {
      return Ok(());
    }

    let record = Record {
      timestamp: Utc::now(),
      index: sample.index,
      expected: sample.expected.as_deref(),
      result,
    };
    let line = serde_json::to_string(&record)?;

    let mut writer = self
      .writer
      .lock()
      .map_err(|_| JsonLinesRecordOutputError::WriterPoisoned)?;
    writeln!(writer, "{}", line)?;
    writer.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::service::PredictRequest;

  fn sample(index: usize) -> LandmarkSample {
    LandmarkSample {
      index,
      request: PredictRequest::default(),
      expected: Some("NO".to_string()),
    }
  }

  fn result(prediction: &str, morse: &str) -> PredictionResult {
    PredictionResult {
      prediction: prediction.to_string(),
      confidence: 0.9,
      morse: morse.to_string(),
      best_guess: prediction.to_string(),
    }
  }

  #[test]
  fn skips_empty_morse_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records/out.jsonl");
    let url = Url::parse(&format!("jsonl://{}", path.display())).unwrap();

    let output = JsonLinesRecordOutput::from_url(&url).unwrap();
    output.render_result(&sample(1), &result("NO", "-. ---")).unwrap();
    output
      .render_result(&sample(2), &result("No sign detected", ""))
      .unwrap();

    let always = Url::parse(&format!("jsonl://{}?always", path.display())).unwrap();
    let output = JsonLinesRecordOutput::from_url(&always).unwrap();
    output
      .render_result(&sample(3), &result("No sign detected", ""))
      .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = content
      .lines()
      .map(|l| serde_json::from_str(l).unwrap())
      .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["index"], 1);
    assert_eq!(lines[0]["prediction"], "NO");
    assert_eq!(lines[0]["morse"], "-. ---");
    assert_eq!(lines[0]["expected"], "NO");
    assert!(lines[0]["timestamp"].is_string());
    assert_eq!(lines[1]["index"], 3);
  }
}
