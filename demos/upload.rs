use std::{convert::Infallible, net::SocketAddr};

use bytes::Bytes;
use formstore::{FileStore, Options, MB};
use http_body_util::Full;
use hyper::{body::Incoming, Request, Response, StatusCode};

// Store each upload under the "file" field and describe it back to the client.
async fn handle(files: FileStore, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let (_parts, mut store) = files.install(req);

    let file = match store.get("file").await {
        Ok(file) => file,
        Err(err @ formstore::Error::NotFound { .. }) => {
            return Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Full::from(format!("BAD REQUEST: {}", err)))
                .unwrap());
        }
        Err(err) => {
            return Ok(Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::from(format!("INTERNAL SERVER ERROR: {}", err)))
                .unwrap());
        }
    };

    // The temporary file is deleted once `store` goes out of scope.
    Ok(describe(file))
}

// With `--features json` the upload is sent back as JSON.
#[cfg(feature = "json")]
fn describe(file: &formstore::File) -> Response<Full<Bytes>> {
    match serde_json::to_string(file) {
        Ok(json) => Response::builder()
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Full::from(json))
            .unwrap(),
        Err(err) => Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::from(format!("INTERNAL SERVER ERROR: {}", err)))
            .unwrap(),
    }
}

#[cfg(not(feature = "json"))]
fn describe(file: &formstore::File) -> Response<Full<Bytes>> {
    Response::new(Full::from(format!(
        "Name: {}, Extension: {}, Size: {}, Path: {:?}",
        file.name(),
        file.extension(),
        file.size(),
        file.path()
    )))
}

#[tokio::main]
async fn main() {
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    println!("Server running at: {}", addr);

    let files = FileStore::new(Options::new().max_memory(4 * MB));

    loop {
        let (socket, _remote_addr) = listener.accept().await.unwrap();
        let socket = hyper_util::rt::TokioIo::new(socket);
        let files = files.clone();

        tokio::spawn(async move {
            let service = hyper::service::service_fn(move |req| handle(files.clone(), req));

            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(socket, service)
                .await
            {
                eprintln!("server error: {}", e);
            }
        });
    }
}
