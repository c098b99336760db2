// Connection handling module
// Serves a single TCP connection on the local task set

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;

use super::bridge::{self, ConnInfo};
use crate::config::AppState;
use crate::logger;

/// Accept a connection and serve it in a spawned local task.
///
/// `conn_counter` is incremented here and decremented when the connection
/// closes, so shutdown can wait for in-flight requests.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer: std::net::SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
) {
    let local = match stream.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            logger::log_warning(&format!("Dropping connection from {peer}: {e}"));
            return;
        }
    };

    conn_counter.fetch_add(1, Ordering::SeqCst);
    logger::log_debug(&format!("Accepted connection from {peer}"));

    handle_connection(
        stream,
        ConnInfo { peer, local },
        Arc::clone(state),
        Arc::clone(conn_counter),
    );
}

fn handle_connection(
    stream: tokio::net::TcpStream,
    conn: ConnInfo,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);

        let performance = &state.config.performance;
        let timeout_duration = Duration::from_secs(std::cmp::max(
            performance.read_timeout,
            performance.write_timeout,
        ));

        let mut builder = http1::Builder::new();
        builder.keep_alive(performance.keep_alive_timeout > 0);

        let service_state = Arc::clone(&state);
        let conn_future = builder.serve_connection(
            io,
            service_fn(move |req| bridge::handle_request(req, Arc::clone(&service_state), conn)),
        );

        match tokio::time::timeout(timeout_duration, conn_future).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => logger::log_warning(&format!(
                "Connection from {} timed out after {} seconds",
                conn.peer,
                timeout_duration.as_secs()
            )),
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
