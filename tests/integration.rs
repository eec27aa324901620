use bytes::Bytes;
use formstore::Multipart;
use futures_util::stream;

fn char_stream(data: &str) -> impl futures_util::Stream<Item = formstore::Result<Bytes>> + Send + 'static {
    let chunks: Vec<_> = data
        .chars()
        .map(|ch| ch.to_string())
        .map(|part| formstore::Result::Ok(Bytes::copy_from_slice(part.as_bytes())))
        .collect();
    stream::iter(chunks)
}

#[tokio::test]
async fn test_multipart_basic() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"My Field\"\r\n\r\nabcd\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"File Field\"; filename=\"a-text-file.txt\"\r\nContent-Type: text/plain\r\n\r\nHello world\nHello\r\nWorld\rAgain\r\n--X-BOUNDARY--\r\n";

    let mut m = Multipart::new(char_stream(data), "X-BOUNDARY");

    while let Some((idx, field)) = m.next_field_with_idx().await.unwrap() {
        if idx == 0 {
            assert_eq!(field.name(), Some("My Field"));
            assert_eq!(field.file_name(), None);
            assert_eq!(field.content_type(), None);
            assert_eq!(field.index(), 0);

            assert_eq!(field.text().await, Ok("abcd".to_owned()));
        } else if idx == 1 {
            assert_eq!(field.name(), Some("File Field"));
            assert_eq!(field.file_name(), Some("a-text-file.txt"));
            assert_eq!(field.content_type(), Some(&mime::TEXT_PLAIN));
            assert_eq!(field.index(), 1);

            assert_eq!(field.text().await, Ok("Hello world\nHello\r\nWorld\rAgain".to_owned()));
        }
    }
}

#[tokio::test]
async fn test_multipart_empty() {
    let data = "--X-BOUNDARY--\r\n";

    let mut m = Multipart::new(char_stream(data), "X-BOUNDARY");

    assert!(m.next_field().await.unwrap().is_none());
    assert!(m.next_field().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_clean_field() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"My Field\"\r\n\r\nabcd\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"File Field\"; filename=\"a-text-file.txt\"\r\nContent-Type: text/plain\r\n\r\nHello world\nHello\r\nWorld\rAgain\r\n--X-BOUNDARY--\r\n";

    let mut m = Multipart::new(char_stream(data), "X-BOUNDARY");

    assert!(m.next_field().await.unwrap().is_some());
    assert!(m.next_field().await.unwrap().is_some());
    assert!(m.next_field().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_skips_preamble() {
    let data = "this is a preamble\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--X-BOUNDARY--";

    let mut m = Multipart::new(char_stream(data), "X-BOUNDARY");

    let field = m.next_field().await.unwrap().unwrap();
    assert_eq!(field.name(), Some("a"));
    assert_eq!(field.bytes().await.unwrap(), Bytes::from_static(b"1"));
    assert!(m.next_field().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_charset() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"a\"\r\nContent-Type: text/plain; charset=iso-8859-1\r\n\r\ncaf\u{e9}\r\n--X-BOUNDARY--\r\n";
    let data = encoding_rs::WINDOWS_1252.encode(data).0.into_owned();
    let stream = stream::iter(vec![formstore::Result::<Bytes>::Ok(Bytes::from(data))]);

    let mut m = Multipart::new(stream, "X-BOUNDARY");

    let field = m.next_field().await.unwrap().unwrap();
    assert_eq!(field.text().await.unwrap(), "caf\u{e9}");
}

#[tokio::test]
async fn test_multipart_incomplete_stream() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nabcd";

    let mut m = Multipart::new(char_stream(data), "X-BOUNDARY");

    let field = m.next_field().await.unwrap().unwrap();
    assert_eq!(
        field.bytes().await,
        Err(formstore::Error::IncompleteFieldData {
            field_name: Some("a".to_owned())
        })
    );
}

#[tokio::test]
async fn test_multipart_with_reader() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";

    let mut m = Multipart::with_reader(data.as_bytes(), "X-BOUNDARY");

    let mut field = m.next_field().await.unwrap().unwrap();
    assert_eq!(field.chunk().await.unwrap(), Some(Bytes::from_static(b"abcd")));
    assert_eq!(field.chunk().await.unwrap(), None);
    drop(field);
    assert!(m.next_field().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_transport_padding() {
    let data = "--X-BOUNDARY  \r\nContent-Disposition: form-data; name=\"a\"\r\n\r\none\r\n--X-BOUNDARY\t\r\nContent-Disposition: form-data; name=\"b\"\r\n\r\ntwo\r\n--X-BOUNDARY--\r\n";

    let mut m = Multipart::new(char_stream(data), "X-BOUNDARY");

    let field = m.next_field().await.unwrap().unwrap();
    assert_eq!(field.name(), Some("a"));
    assert_eq!(field.text().await, Ok("one".to_owned()));

    let field = m.next_field().await.unwrap().unwrap();
    assert_eq!(field.name(), Some("b"));
    assert_eq!(field.text().await, Ok("two".to_owned()));

    assert!(m.next_field().await.unwrap().is_none());
}

#[tokio::test]
async fn test_multipart_boundary_prefix_in_data() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a.txt\"\r\n\r\nab\r\n--X-BOUNDARYZZ\r\n--X-BOUNDARY--\r\n";

    let mut m = Multipart::new(char_stream(data), "X-BOUNDARY");

    let field = m.next_field().await.unwrap().unwrap();
    assert_eq!(field.text().await, Ok("ab\r\n--X-BOUNDARYZZ".to_owned()));
    assert!(m.next_field().await.unwrap().is_none());
}
