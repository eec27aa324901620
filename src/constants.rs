use std::borrow::Cow;

/// A byte.
pub const B: u64 = 1;
/// A kilobyte, 1024 bytes.
pub const KB: u64 = 1024 * B;
/// A megabyte, 1024 kilobytes.
pub const MB: u64 = 1024 * KB;
/// A gigabyte, 1024 megabytes.
pub const GB: u64 = 1024 * MB;
/// A terabyte, 1024 gigabytes.
pub const TB: u64 = 1024 * GB;

pub(crate) const DEFAULT_MAX_MEMORY: u64 = 24 * KB;

// Text values may go this far past `max_memory` before the form is refused.
pub(crate) const TEXT_VALUE_SLACK: u64 = 10 * MB;

pub(crate) const TEMP_FILE_PREFIX: &str = ".formstore-";

pub(crate) const MAX_HEADERS: usize = 32;
pub(crate) const BOUNDARY_EXT: &str = "--";
pub(crate) const CR: &str = "\r";
pub(crate) const CRLF: &str = "\r\n";
pub(crate) const CRLF_CRLF: &str = "\r\n\r\n";

pub(crate) const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContentDispositionAttr {
    Name,
    FileName,
}

impl ContentDispositionAttr {
    /// Extract the attribute value from a `Content-Disposition` header value.
    ///
    /// Parameters are split on `;` outside of quoted strings and their names
    /// compare case-insensitively. Quoted values are unescaped.
    pub fn extract_from<'h>(&self, header: &'h [u8]) -> Option<Cow<'h, [u8]>> {
        let wanted: &[u8] = match self {
            ContentDispositionAttr::Name => b"name",
            ContentDispositionAttr::FileName => b"filename",
        };

        // The disposition type is a token, so the first `;` starts the parameters.
        let mut rest = &header[memchr::memchr(b';', header)?..];

        while let Some(param) = rest.strip_prefix(b";") {
            let param = trim_ascii(param);

            let (key, value) = match param.iter().position(|&b| b == b'=' || b == b';') {
                Some(idx) if param[idx] == b'=' => (trim_ascii(&param[..idx]), trim_ascii_start(&param[idx + 1..])),
                Some(idx) => {
                    rest = &param[idx..];
                    continue;
                }
                None => return None,
            };

            let (value, after) = match value.strip_prefix(b"\"") {
                Some(quoted) => {
                    let (value, len) = unquote(quoted)?;
                    (value, &quoted[len..])
                }
                None => {
                    let end = memchr::memchr(b';', value).unwrap_or(value.len());
                    (Cow::Borrowed(trim_ascii(&value[..end])), &value[end..])
                }
            };

            if key.eq_ignore_ascii_case(wanted) {
                return Some(value);
            }

            rest = &after[memchr::memchr(b';', after)?..];
        }

        None
    }
}

// Reads a quoted string up to its closing quote, returning the value and the
// number of bytes consumed.
fn unquote(quoted: &[u8]) -> Option<(Cow<'_, [u8]>, usize)> {
    let mut unescaped: Option<Vec<u8>> = None;
    let mut idx = 0;

    while idx < quoted.len() {
        match quoted[idx] {
            b'"' => {
                let value = match unescaped {
                    Some(buf) => Cow::Owned(buf),
                    None => Cow::Borrowed(&quoted[..idx]),
                };
                return Some((value, idx + 1));
            }
            b'\\' if idx + 1 < quoted.len() => {
                unescaped
                    .get_or_insert_with(|| quoted[..idx].to_vec())
                    .push(quoted[idx + 1]);
                idx += 2;
                continue;
            }
            b => {
                if let Some(buf) = unescaped.as_mut() {
                    buf.push(b);
                }
            }
        }
        idx += 1;
    }

    None
}

fn trim_ascii_start(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let mut bytes = trim_ascii_start(bytes);
    while let [rest @ .., last] = bytes {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_name_only() {
        let val = br#"form-data; name="my_field""#;
        let name = ContentDispositionAttr::Name.extract_from(val);
        let filename = ContentDispositionAttr::FileName.extract_from(val);
        assert_eq!(&*name.unwrap(), b"my_field");
        assert!(filename.is_none());

        let val = br#"form-data; name="my field""#;
        let name = ContentDispositionAttr::Name.extract_from(val);
        assert_eq!(&*name.unwrap(), b"my field");
    }

    #[test]
    fn test_content_disposition_extraction() {
        let val = br#"form-data; name="my_field"; filename="file abc.txt""#;
        let name = ContentDispositionAttr::Name.extract_from(val);
        let filename = ContentDispositionAttr::FileName.extract_from(val);
        assert_eq!(&*name.unwrap(), b"my_field");
        assert_eq!(&*filename.unwrap(), b"file abc.txt");

        let val = "form-data; name=\"你好\"; filename=\"কখগ-你好.txt\"".as_bytes();
        let name = ContentDispositionAttr::Name.extract_from(val);
        let filename = ContentDispositionAttr::FileName.extract_from(val);
        assert_eq!(&*name.unwrap(), "你好".as_bytes());
        assert_eq!(&*filename.unwrap(), "কখগ-你好.txt".as_bytes());
    }

    #[test]
    fn test_content_disposition_filename_before_name() {
        let val = br#"form-data; filename="pic.png"; name="avatar""#;
        let name = ContentDispositionAttr::Name.extract_from(val);
        let filename = ContentDispositionAttr::FileName.extract_from(val);
        assert_eq!(&*name.unwrap(), b"avatar");
        assert_eq!(&*filename.unwrap(), b"pic.png");
    }

    #[test]
    fn test_content_disposition_unquoted() {
        let val = b"form-data; name=avatar; filename=pic.png";
        let name = ContentDispositionAttr::Name.extract_from(val);
        let filename = ContentDispositionAttr::FileName.extract_from(val);
        assert_eq!(&*name.unwrap(), b"avatar");
        assert_eq!(&*filename.unwrap(), b"pic.png");
    }

    #[test]
    fn test_content_disposition_quoted_semicolon() {
        let val = br#"form-data; name="a;b"; filename="x;y.txt""#;
        let name = ContentDispositionAttr::Name.extract_from(val);
        let filename = ContentDispositionAttr::FileName.extract_from(val);
        assert_eq!(&*name.unwrap(), b"a;b");
        assert_eq!(&*filename.unwrap(), b"x;y.txt");
    }

    #[test]
    fn test_content_disposition_name_inside_quoted_filename() {
        let val = br#"form-data; filename="x; name=evil.txt"; name="f""#;
        let name = ContentDispositionAttr::Name.extract_from(val);
        let filename = ContentDispositionAttr::FileName.extract_from(val);
        assert_eq!(&*name.unwrap(), b"f");
        assert_eq!(&*filename.unwrap(), b"x; name=evil.txt");
    }

    #[test]
    fn test_content_disposition_case_insensitive_names() {
        let val = br#"Form-Data; NAME="f"; FileName="a.txt""#;
        let name = ContentDispositionAttr::Name.extract_from(val);
        let filename = ContentDispositionAttr::FileName.extract_from(val);
        assert_eq!(&*name.unwrap(), b"f");
        assert_eq!(&*filename.unwrap(), b"a.txt");
    }

    #[test]
    fn test_content_disposition_escaped_quote() {
        let val = br#"form-data; name="f"; filename="say \"hi\".txt""#;
        let filename = ContentDispositionAttr::FileName.extract_from(val);
        assert_eq!(&*filename.unwrap(), br#"say "hi".txt"#);

        let val = br#"form-data; name="f"; filename="open.txt"#;
        assert!(ContentDispositionAttr::FileName.extract_from(val).is_none());
    }

    #[test]
    fn test_units() {
        assert_eq!(KB, 1024);
        assert_eq!(MB, 1024 * 1024);
        assert_eq!(TB / GB, 1024);
        assert_eq!(DEFAULT_MAX_MEMORY, 24_576);
    }
}
