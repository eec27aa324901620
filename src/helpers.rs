use std::path::Path;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use httparse::Header;

pub(crate) fn convert_raw_headers_to_header_map(raw_headers: &[Header]) -> crate::Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(raw_headers.len());

    for raw_header in raw_headers {
        let name = HeaderName::try_from(raw_header.name).map_err(|err| crate::Error::DecodeHeaderName {
            name: raw_header.name.to_owned(),
            cause: err.into(),
        })?;

        let value = HeaderValue::try_from(raw_header.value).map_err(|err| crate::Error::DecodeHeaderValue {
            value: raw_header.value.to_owned(),
            cause: err.into(),
        })?;

        headers.append(name, value);
    }

    Ok(headers)
}

/// Splits an uploaded filename into its stem and its final extension.
///
/// Only the last path component of the client-supplied name is considered.
pub(crate) fn split_file_name(file_name: &str) -> (String, String) {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let path = Path::new(base);

    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => {
            let stem = &base[..base.len() - ext.len() - 1];
            (stem.to_owned(), ext.to_owned())
        }
        _ => (base.trim_end_matches('.').to_owned(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_file_name() {
        assert_eq!(split_file_name("pic.png"), ("pic".to_owned(), "png".to_owned()));
        assert_eq!(split_file_name("archive.tar.gz"), ("archive.tar".to_owned(), "gz".to_owned()));
        assert_eq!(split_file_name("README"), ("README".to_owned(), String::new()));
        assert_eq!(split_file_name(".bashrc"), (".bashrc".to_owned(), String::new()));
        assert_eq!(split_file_name("C:\\Users\\me\\doc.txt"), ("doc".to_owned(), "txt".to_owned()));
        assert_eq!(split_file_name("../../etc/passwd"), ("passwd".to_owned(), String::new()));
    }
}
