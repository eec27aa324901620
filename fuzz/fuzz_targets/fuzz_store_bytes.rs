#![no_main]

use std::convert::Infallible;

use formstore::bytes::Bytes;
use formstore::FileStore;
use futures_util::stream::once;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use libfuzzer_sys::fuzz_target;
use tokio::runtime;

fuzz_target!(|data: &[u8]| {
    let data = data.to_vec();
    let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("multipart/form-data; boundary=X-BOUNDARY"));
    let mut store = FileStore::default().store(&headers, stream);

    let rt = runtime::Builder::new_current_thread().build().expect("runtime");
    rt.block_on(async {
        // A second lookup must never re-read the body.
        let first = store.get_multi("file").await.map(|files| files.len());
        let second = store.get_multi("file").await.map(|files| files.len());
        if let Ok(count) = first {
            assert_eq!(second, Ok(count));
        }
    })
});
