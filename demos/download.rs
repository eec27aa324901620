use std::{convert::Infallible, net::SocketAddr, path::Path};

use bytes::Bytes;
use formstore::{Body, FileStore};
use http_body_util::{BodyExt, Empty};
use hyper::{body::Incoming, Request, Response, StatusCode};

// Send `./example.png` to the client as a download named `myFile.png`.
async fn handle(files: FileStore, req: Request<Incoming>) -> Result<Response<Body>, Infallible> {
    let (_parts, store) = files.install(req);

    match store.serve("myFile.png", Path::new("./example.png")).await {
        Ok(res) => Ok(res),
        Err(err) => {
            eprintln!("failed to serve file: {}", err);

            let mut res = Response::new(Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync());
            *res.status_mut() = StatusCode::NOT_FOUND;
            Ok(res)
        }
    }
}

#[tokio::main]
async fn main() {
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    println!("Server running at: {}", addr);

    let files = FileStore::default();

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
