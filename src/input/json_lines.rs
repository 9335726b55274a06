// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/input/json_lines.rs - JSON Lines 关键点录制文件输入
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

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::LandmarkSample, service::PredictRequest};

#[derive(Error, Debug)]
pub enum JsonLinesInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 每行与 `/predict-sign` 请求体相同，可额外带 `expected` 字段
#[derive(Debug, Deserialize)]
struct JsonLine {
  #[serde(flatten)]
  request: PredictRequest,
  #[serde(default)]
  expected: Option<String>,
}

pub struct JsonLinesInput {
  lines: Lines<BufReader<File>>,
  line_number: usize,
  index: usize,
}

impl FromUrlWithScheme for JsonLinesInput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesInput {
  type Error = JsonLinesInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(JsonLinesInputError::SchemeMismatch);
    }

    info!("打开 JSON Lines 输入: {}", url.path());
    let file = File::open(url.path())?;
    Ok(JsonLinesInput {
      lines: BufReader::new(file).lines(),
      line_number: 0,
      index: 0,
    })
  }
}

impl Iterator for JsonLinesInput {
  type Item = LandmarkSample;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let line = self.lines.next()?;
      self.line_number += 1;
      let line = match line {
        Ok(line) => line,
        // 非 UTF-8 的行已被读过，跳过即可；其它 I/O 错误结束输入
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
          warn!("第 {} 行不是有效的 UTF-8, 跳过: {}", self.line_number, e);
          continue;
        }
        Err(e) => {
          warn!("读取第 {} 行失败: {}", self.line_number, e);
          return None;
        }
      };
      if line.trim().is_empty() {
        continue;
      }

      match serde_json::from_str::<JsonLine>(&line) {
        Ok(parsed) => {
          self.index += 1;
          return Some(LandmarkSample {
            index: self.index,
            request: parsed.request,
            expected: parsed.expected,
          });
        }
        Err(e) => warn!("第 {} 行不是有效的样本, 跳过: {}", self.line_number, e),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn reads_flat_and_hand_samples() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"landmarks": [0.1, 0.2], "expected": "NO"}}"#).unwrap();
    writeln!(file).unwrap();
    writeln!(file, "not json").unwrap();
    writeln!(
      file,
      r#"{{"hands": [{{"handedness": "Left", "landmarks": [0.5]}}]}}"#
    )
    .unwrap();
    file.flush().unwrap();

    let url = Url::parse(&format!("jsonl://{}", file.path().display())).unwrap();
    let samples: Vec<_> = JsonLinesInput::from_url(&url).unwrap().collect();

    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].expected.as_deref(), Some("NO"));
    assert_eq!(samples[0].request.landmarks, Some(vec![0.1, 0.2]));
    assert_eq!(samples[1].index, 2);
    assert_eq!(samples[1].expected, None);
    let hands = samples[1].request.hands.as_ref().unwrap();
    assert_eq!(hands.len(), 1);
    assert_eq!(hands[0].landmarks, vec![0.5]);
  }

  #[test]
  fn skips_line_with_invalid_utf8() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"landmarks": [0.1], "expected": "NO"}}"#).unwrap();
    file.write_all(b"\xff\xfe\n").unwrap();
    writeln!(file, r#"{{"landmarks": [0.2], "expected": "YES"}}"#).unwrap();
    file.flush().unwrap();

    let url = Url::parse(&format!("jsonl://{}", file.path().display())).unwrap();
    let samples: Vec<_> = JsonLinesInput::from_url(&url).unwrap().collect();

    assert_eq!(samples.len(), 2);
    assert_eq!(samples[1].expected.as_deref(), Some("YES"));
    assert_eq!(samples[1].request.landmarks, Some(vec![0.2]));
  }
}
