//! Security Module
//!
//! 入力サイズの上限と、ストアのファイル名に使うキーの検証を提供するモジュール。

use std::io::Read;

use crate::error::ScoreSheetError;

/// 入力ファイルの既定の最大サイズ（256 MiB）
pub const DEFAULT_MAX_INPUT_SIZE: u64 = 256 * 1024 * 1024;

/// 上限付きで入力全体を読み込む
///
/// 上限を超えた場合は`MalformedInput`（行番号0）を返します。
pub(crate) fn read_limited<R: Read>(reader: R, max_size: u64) -> Result<Vec<u8>, ScoreSheetError> {
    let mut buffer = Vec::new();
    let bytes_read = reader.take(max_size.saturating_add(1)).read_to_end(&mut buffer)?;

    if bytes_read as u64 > max_size {
        return Err(ScoreSheetError::MalformedInput {
            row: 0,
            message: format!("Input size exceeds maximum: {} bytes", max_size),
        });
    }
    Ok(buffer)
}

/// ストアのキーがファイル名として安全かを検証する
///
/// パストラバーサルを防ぐため、空文字列・区切り文字・`..`・制御文字を拒否します。
pub(crate) fn validate_store_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("Empty key is not allowed".to_string());
    }

    if key.contains('/') || key.contains('\\') {
        return Err(format!("Path separator in key is not allowed: {}", key));
    }

    if key.contains("..") {
        return Err(format!("Path traversal detected: {}", key));
    }

    if key.chars().any(|c| c.is_control() || c == ':') {
        return Err(format!("Control character in key is not allowed: {:?}", key));
    }

    Ok(())
}
