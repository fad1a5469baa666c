//! 参考底图定义：类型在构造时确定，文件路径的扩展名必须始终与类型一致。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnderlayKind {
    Dgn,
    Dwf,
    Pdf,
}

impl UnderlayKind {
    /// 该类型要求的文件扩展名（含点号，比较时不区分大小写）。
    pub fn extension(self) -> &'static str {
        match self {
            UnderlayKind::Dgn => ".DGN",
            UnderlayKind::Dwf => ".DWF",
            UnderlayKind::Pdf => ".PDF",
        }
    }

    /// 编解码层使用的对象代码。
    pub fn code_name(self) -> &'static str {
        match self {
            UnderlayKind::Dgn => "DGNDEFINITION",
            UnderlayKind::Dwf => "DWFDEFINITION",
            UnderlayKind::Pdf => "PDFDEFINITION",
        }
    }
}

impl fmt::Display for UnderlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension()[1..])
    }
}

/// 路径非法字符的检查范围。
///
/// `Leading` 只检查首字符，与现有行为一致；路径中间的非法字符不会被拒绝。
/// `Full` 检查整个路径。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathCheck {
    #[default]
    Leading,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnderlayError {
    #[error("underlay file path must not be empty")]
    EmptyPath,
    #[error("underlay file path contains invalid character {character:?} at index {index}")]
    InvalidPathCharacter { index: usize, character: char },
    #[error("underlay type {kind} and file extension {found:?} do not match (expected {expected})")]
    ExtensionMismatch {
        kind: UnderlayKind,
        expected: &'static str,
        found: String,
    },
}

/// 参考底图定义。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "UnderlayDefinitionRecord",
    into = "UnderlayDefinitionRecord"
)]
pub struct UnderlayDefinition {
    name: String,
    file: String,
    kind: UnderlayKind,
    path_check: PathCheck,
}

impl UnderlayDefinition {
    pub fn new(
        name: impl Into<String>,
        file: impl Into<String>,
        kind: UnderlayKind,
    ) -> Result<Self, UnderlayError> {
        Self::with_path_check(name, file, kind, PathCheck::default())
    }

    /// 指定路径检查范围构造，之后每次修改路径沿用同一范围。
    pub fn with_path_check(
        name: impl Into<String>,
        file: impl Into<String>,
        kind: UnderlayKind,
        path_check: PathCheck,
    ) -> Result<Self, UnderlayError> {
        let file = file.into();
        validate_file(&file, kind, path_check)?;
        Ok(Self {
            name: name.into(),
            file,
            kind,
            path_check,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> UnderlayKind {
        self.kind
    }

    #[inline]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// 编解码层使用的对象代码，由类型决定。
    #[inline]
    pub fn code_name(&self) -> &'static str {
        self.kind.code_name()
    }

    #[inline]
    pub fn path_check(&self) -> PathCheck {
        self.path_check
    }

    /// 修改文件路径。校验失败时保留原路径。
    pub fn set_file(&mut self, file: impl Into<String>) -> Result<(), UnderlayError> {
        let file = file.into();
        validate_file(&file, self.kind, self.path_check)?;
        self.file = file;
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct UnderlayDefinitionRecord {
    name: String,
    file: String,
    kind: UnderlayKind,
    #[serde(default)]
    path_check: PathCheck,
}

impl TryFrom<UnderlayDefinitionRecord> for UnderlayDefinition {
    type Error = UnderlayError;

    fn try_from(record: UnderlayDefinitionRecord) -> Result<Self, Self::Error> {
        Self::with_path_check(record.name, record.file, record.kind, record.path_check)
    }
}

impl From<UnderlayDefinition> for UnderlayDefinitionRecord {
    fn from(definition: UnderlayDefinition) -> Self {
        Self {
            name: definition.name,
            file: definition.file,
            kind: definition.kind,
            path_check: definition.path_check,
        }
    }
}

/// 文件路径中不允许出现的字符：ASCII 控制字符以及 `"` `<` `>` `|`。
#[inline]
pub fn is_invalid_path_char(character: char) -> bool {
    matches!(character, '\0'..='\u{1f}' | '"' | '<' | '>' | '|')
}

/// 返回路径中第一个非法字符的字节位置与字符。
pub fn first_invalid_path_char(path: &str) -> Option<(usize, char)> {
    path.char_indices()
        .find(|(_, character)| is_invalid_path_char(*character))
}

/// 取文件扩展名（含点号）：最后一个路径分隔符之后的最后一个 `.` 起的部分。
/// 没有点号或以点号结尾时返回空串。
pub fn file_extension(path: &str) -> &str {
    let Some(dot) = path.rfind('.') else {
        return "";
    };
    if path[dot..].contains(|c: char| matches!(c, '/' | '\\' | ':')) || dot + 1 == path.len() {
        return "";
    }
    &path[dot..]
}

fn validate_file(
    file: &str,
    kind: UnderlayKind,
    path_check: PathCheck,
) -> Result<(), UnderlayError> {
    if file.is_empty() {
        return Err(UnderlayError::EmptyPath);
    }

    let offending = match path_check {
        PathCheck::Leading => file
            .chars()
            .next()
            .filter(|character| is_invalid_path_char(*character))
            .map(|character| (0, character)),
        PathCheck::Full => first_invalid_path_char(file),
    };
    if let Some((index, character)) = offending {
        return Err(UnderlayError::InvalidPathCharacter { index, character });
    }

    let extension = file_extension(file);
    if !extension.eq_ignore_ascii_case(kind.extension()) {
        return Err(UnderlayError::ExtensionMismatch {
            kind,
            expected: kind.extension(),
            found: extension.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_requires_matching_extension() {
        let err = UnderlayDefinition::new("plan", "plan.txt", UnderlayKind::Pdf).unwrap_err();
        assert_eq!(
            err,
            UnderlayError::ExtensionMismatch {
                kind: UnderlayKind::Pdf,
                expected: ".PDF",
                found: ".txt".to_string(),
            }
        );

        let def =
            UnderlayDefinition::new("plan", "plan.PDF", UnderlayKind::Pdf).expect("valid pdf");
        assert_eq!(def.kind(), UnderlayKind::Pdf);
        assert_eq!(def.file(), "plan.PDF");
        assert_eq!(def.name(), "plan");
        assert_eq!(def.code_name(), "PDFDEFINITION");
    }

    #[test]
    fn empty_path_is_rejected() {
        assert_eq!(
            UnderlayDefinition::new("site", "", UnderlayKind::Dgn).unwrap_err(),
            UnderlayError::EmptyPath
        );
    }

    #[test]
    fn each_kind_maps_to_its_extension_and_code() {
        let cases = [
            (UnderlayKind::Dgn, "site.dgn", "DGNDEFINITION"),
            (UnderlayKind::Dwf, "C:\\xref\\site.Dwf", "DWFDEFINITION"),
            (UnderlayKind::Pdf, "../sheets/site.pdf", "PDFDEFINITION"),
        ];
        for (kind, file, code) in cases {
            let def = UnderlayDefinition::new("site", file, kind).expect("valid underlay");
            assert_eq!(def.code_name(), code);
        }
        assert!(UnderlayDefinition::new("site", "site.pdf", UnderlayKind::Dwf).is_err());
    }

    #[test]
    fn set_file_is_case_insensitive_and_keeps_previous_path_on_failure() {
        let mut def =
            UnderlayDefinition::new("plan", "plan.PDF", UnderlayKind::Pdf).expect("valid pdf");
        def.set_file("revised.pdf").expect("case-insensitive match");
        assert_eq!(def.file(), "revised.pdf");

        let err = def.set_file("revised.dgn").unwrap_err();
        assert!(matches!(err, UnderlayError::ExtensionMismatch { .. }));
        assert_eq!(def.file(), "revised.pdf");
        assert_eq!(def.kind(), UnderlayKind::Pdf);

        assert_eq!(def.set_file("").unwrap_err(), UnderlayError::EmptyPath);
        assert_eq!(def.file(), "revised.pdf");
        assert_eq!(def.code_name(), "PDFDEFINITION");
    }

    #[test]
    fn leading_invalid_character_is_rejected() {
        let err = UnderlayDefinition::new("plan", "<plan.pdf", UnderlayKind::Pdf).unwrap_err();
        assert_eq!(
            err,
            UnderlayError::InvalidPathCharacter {
                index: 0,
                character: '<'
            }
        );
        let mut def =
            UnderlayDefinition::new("plan", "plan.pdf", UnderlayKind::Pdf).expect("valid pdf");
        assert!(def.set_file("|plan.pdf").is_err());
        assert_eq!(def.file(), "plan.pdf");
    }

    // 默认只检查首字符：嵌在路径中间的非法字符会被放行，`Full` 模式才会拒绝。
    #[test]
    fn embedded_invalid_character_depends_on_path_check() {
        let path = "plan<1>.pdf";
        assert_eq!(first_invalid_path_char(path), Some((4, '<')));

        let leading =
            UnderlayDefinition::new("plan", path, UnderlayKind::Pdf).expect("leading-only check");
        assert_eq!(leading.path_check(), PathCheck::Leading);

        let err =
            UnderlayDefinition::with_path_check("plan", path, UnderlayKind::Pdf, PathCheck::Full)
                .unwrap_err();
        assert_eq!(
            err,
            UnderlayError::InvalidPathCharacter {
                index: 4,
                character: '<'
            }
        );

        let mut strict = UnderlayDefinition::with_path_check(
            "plan",
            "plan.pdf",
            UnderlayKind::Pdf,
            PathCheck::Full,
        )
        .expect("clean path");
        assert!(strict.set_file("a\tb.pdf").is_err());
        assert_eq!(strict.file(), "plan.pdf");
    }

    #[test]
    fn extension_follows_last_separator() {
        assert_eq!(file_extension("plan.PDF"), ".PDF");
        assert_eq!(file_extension("archive.tar.pdf"), ".pdf");
        assert_eq!(file_extension("dir.v2/plan"), "");
        assert_eq!(file_extension("dir.v2\\plan"), "");
        assert_eq!(file_extension("plan."), "");
        assert_eq!(file_extension("plan"), "");
        assert_eq!(file_extension(".pdf"), ".pdf");
    }

    #[test]
    fn deserialization_runs_the_same_validation() {
        let ok: UnderlayDefinition =
            serde_json::from_str(r#"{"name":"plan","file":"plan.dwf","kind":"dwf"}"#)
                .expect("valid record");
        assert_eq!(ok.code_name(), "DWFDEFINITION");
        assert_eq!(ok.path_check(), PathCheck::Leading);

        let bad = serde_json::from_str::<UnderlayDefinition>(
            r#"{"name":"plan","file":"plan.pdf","kind":"dgn"}"#,
        );
        assert!(bad.is_err());
    }
}
