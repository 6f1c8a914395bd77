//! Parser Module
//!
//! 入力ファイルを`RowMatrix`に読み込む。
//! ワークブック（calamine）と区切り文字テキスト（CSV / TSV）に対応します。

mod delimited;
mod workbook;

pub(crate) use delimited::DelimitedReader;
pub(crate) use workbook::WorkbookReader;

use tracing::debug;

use crate::api::{InputFormat, SheetSelector};
use crate::error::ScoreSheetError;
use crate::types::RowMatrix;

/// ZIPコンテナ（xlsx / ods）のシグネチャ
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
/// OLE複合ドキュメント（xls）のシグネチャ
const OLE_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// 先頭バイトから入力形式を判定する
pub(crate) fn detect_format(bytes: &[u8]) -> InputFormat {
    if bytes.starts_with(ZIP_SIGNATURE) || bytes.starts_with(OLE_SIGNATURE) {
        InputFormat::Workbook
    } else {
        InputFormat::Delimited
    }
}

/// バイト列を行列に読み込む
///
/// `InputFormat::Auto`の場合は先頭バイトで判定します。
/// `selector`はワークブック入力のときだけ使われます。
pub(crate) fn read_matrix(
    bytes: Vec<u8>,
    format: InputFormat,
    selector: &SheetSelector,
) -> Result<RowMatrix, ScoreSheetError> {
    let format = match format {
        InputFormat::Auto => detect_format(&bytes),
        other => other,
    };

    let matrix = match format {
        InputFormat::Delimited => DelimitedReader::read_bytes(&bytes)?,
        _ => {
            let mut reader = WorkbookReader::open(bytes)?;
            let sheet = reader.select_sheet(selector)?;
            debug!(sheet = %sheet, "selected worksheet");
            reader.read_sheet(&sheet)?
        }
    };

    debug!(
        rows = matrix.row_count(),
        columns = matrix.column_count(),
        ?format,
        "read input matrix"
    );
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(b"PK\x03\x04rest"), InputFormat::Workbook);
        assert_eq!(
            detect_format(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1]),
            InputFormat::Workbook
        );
        assert_eq!(detect_format("ID,氏名".as_bytes()), InputFormat::Delimited);
        assert_eq!(detect_format(b""), InputFormat::Delimited);
    }

    #[test]
    fn test_read_matrix_delimited_auto() {
        let matrix = read_matrix(
            b"a\tb\n1\t2\n".to_vec(),
            InputFormat::Auto,
            &SheetSelector::default(),
        )
        .unwrap();
        assert_eq!(matrix.cell(1, 0), "1");
    }

    #[test]
    fn test_forced_workbook_rejects_text() {
        let result = read_matrix(
            b"a,b\n".to_vec(),
            InputFormat::Workbook,
            &SheetSelector::default(),
        );
        assert!(matches!(result, Err(ScoreSheetError::Parse(_))));
    }
}
