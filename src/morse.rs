// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/morse.rs - 摩斯电码编解码
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

//! 字母之间用一个空格分隔，单词之间用 ` / ` 分隔。
//! 码表之外的字符在编码时直接丢弃。

/// 字符间分隔
pub const LETTER_SEPARATOR: &str = " ";
/// 单词间分隔
pub const WORD_SEPARATOR: &str = " / ";

const MORSE_TABLE: [(char, &str); 54] = [
  ('A', ".-"),
  ('B', "-..."),
  ('C', "-.-."),
  ('D', "-.."),
  ('E', "."),
  ('F', "..-."),
  ('G', "--."),
  ('H', "...."),
  ('I', ".."),
  ('J', ".---"),
  ('K', "-.-"),
  ('L', ".-.."),
  ('M', "--"),
  ('N', "-."),
  ('O', "---"),
  ('P', ".--."),
  ('Q', "--.-"),
  ('R', ".-."),
  ('S', "..."),
  ('T', "-"),
  ('U', "..-"),
  ('V', "...-"),
  ('W', ".--"),
  ('X', "-..-"),
  ('Y', "-.--"),
  ('Z', "--.."),
  ('0', "-----"),
  ('1', ".----"),
  ('2', "..---"),
  ('3', "...--"),
  ('4', "....-"),
  ('5', "....."),
  ('6', "-...."),
  ('7', "--..."),
  ('8', "---.."),
  ('9', "----."),
  ('.', ".-.-.-"),
  (',', "--..--"),
  ('?', "..--.."),
  ('\'', ".----."),
  ('!', "-.-.--"),
  ('/', "-..-."),
  ('(', "-.--."),
  (')', "-.--.-"),
  ('&', ".-..."),
  (':', "---..."),
  (';', "-.-.-."),
  ('=', "-...-"),
  ('+', ".-.-."),
  ('-', "-....-"),
  ('_', "..--.-"),
  ('"', ".-..-."),
  ('$', "...-..-"),
  ('@', ".--.-."),
];

pub fn lookup(c: char) -> Option<&'static str> {
  let c = c.to_ascii_uppercase();
  MORSE_TABLE
    .iter()
    .find(|(k, _)| *k == c)
    .map(|(_, code)| *code)
}

pub fn reverse_lookup(code: &str) -> Option<char> {
  MORSE_TABLE
    .iter()
    .find(|(_, v)| *v == code)
    .map(|(c, _)| *c)
}

/// 文本转摩斯电码
pub fn encode(text: &str) -> String {
  text
    .split_whitespace()
    .map(|word| {
      word
        .chars()
        .filter_map(lookup)
        .collect::<Vec<_>>()
        .join(LETTER_SEPARATOR)
    })
    .filter(|word| !word.is_empty())
    .collect::<Vec<_>>()
    .join(WORD_SEPARATOR)
}

/// 标签转摩斯电码，哨兵标签不查表，直接返回空串
pub fn encode_label(label: &str, sentinel: &str) -> String {
  if label == sentinel {
    return String::new();
  }
  encode(label)
}

/// 前端按键输入使用的 `·` 与 `–` 等符号统一成 `.` 与 `-`
fn normalize_symbol(c: char) -> char {
  match c {
    '·' | '•' | '∙' => '.',
    '–' | '—' | '−' => '-',
    other => other,
  }
}

/// 摩斯电码转文本，无法识别的码组直接丢弃
pub fn decode(morse: &str) -> String {
  let normalized: String = morse.chars().map(normalize_symbol).collect();
  normalized
    .split('/')
    .map(|word| {
      word
        .split_whitespace()
        .filter_map(reverse_lookup)
        .collect::<String>()
    })
    .filter(|word| !word.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}
