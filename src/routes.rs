//! Built-in route table: the default [`Dispatcher`] implementation.
//!
//! Ships the server-internal endpoints (`_status`, the `_www` static
//! tree) and lets embedders register their own handlers. Anything
//! unmatched falls through to 404.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cache::MapCache;
use crate::config::Config;
use crate::http::connection::Dispatcher;
use crate::http::output::Output;
use crate::http::request::{Method, Request};
use crate::http::response::{MIME_JSON, MIME_TEXTHTML, Reply, Status};
use crate::server::pool::ServerState;

const INDEX_HTML: &str = "index.html";

/// Page served on `GET /`, pointing browsers at the static tree.
const WWW_REDIRECT: &str = "<html>\n\
<head><meta http-equiv=\"refresh\" content=\"0; url=_www/index.html\"/></head>\n\
<body><p>Redirect...</p></body>\n\
</html>\n";

pub type Handler = dyn Fn(&Request, &mut Reply) -> Status + Send + Sync;

struct Route {
    method: Method,
    head: &'static str,
    handler: Box<Handler>,
}

/// First-segment route table. HEAD requests match GET routes; the
/// connection layer suppresses the body after writing the header.
pub struct Router {
    routes: Vec<Route>,
    fallback: Option<Box<Handler>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: None,
        }
    }

    /// Registers a handler for `method` requests whose first path segment
    /// equals `head`.
    pub fn route<F>(mut self, method: Method, head: &'static str, handler: F) -> Self
    where
        F: Fn(&Request, &mut Reply) -> Status + Send + Sync + 'static,
    {
        self.routes.push(Route {
            method,
            head,
            handler: Box::new(handler),
        });
        self
    }

    /// Registers the handler for requests no route matched.
    pub fn fallback<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Request, &mut Reply) -> Status + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(handler));
        self
    }

    /// The stock table: `_status`, and `_www` when a root is configured.
    pub fn with_defaults(
        state: Arc<ServerState>,
        cache: Arc<MapCache>,
        config: Arc<Config>,
    ) -> Self {
        let www_root = config.www_root.clone();

        let mut router = Self::new().route(Method::GET, "_status", move |_req, reply| {
            status_snapshot(&state, &config, reply)
        });

        if let Some(root) = www_root {
            router = router.add_www(cache, root);
        }

        router
    }

    /// Mounts the static tree at `_www`.
    pub fn add_www(self, cache: Arc<MapCache>, root: PathBuf) -> Self {
        self.route(Method::GET, "_www", move |req, reply| {
            serve_www(&cache, &root, &req.segments[1..], reply)
        })
    }
}

fn method_matches(route: Method, request: Method) -> bool {
    route == request || (route == Method::GET && request == Method::HEAD)
}

impl Dispatcher for Router {
    fn dispatch(&self, request: &Request, reply: &mut Reply) -> Status {
        let Some(head) = request.segments.first() else {
            reply.output = Output::buffer(WWW_REDIRECT);
            reply.mime = Some(MIME_TEXTHTML.to_string());
            return Status::Ok;
        };

        for route in &self.routes {
            if method_matches(route.method, request.method) && route.head == head {
                return (route.handler)(request, reply);
            }
        }

        match &self.fallback {
            Some(handler) => handler(request, reply),
            None => Status::NotFound,
        }
    }
}

/// `GET /_status`: a JSON snapshot of counters and configured limits.
fn status_snapshot(state: &ServerState, config: &Config, reply: &mut Reply) -> Status {
    let now = timeval(SystemTime::now());
    let started = timeval(state.started());

    let doc = serde_json::json!({
        "startTimeVal": { "sec": started.0, "usec": started.1 },
        "thisTimeVal": { "sec": now.0, "usec": now.1 },
        "threads": state.thread_count(),
        "clients": state.client_count(),
        "limits": {
            "maxHeaders": state.limits.max_headers,
            "maxClients": state.limits.max_clients,
            "maxContentLength": state.limits.max_content_length,
            "clientsForThread": state.limits.clients_per_thread,
            "threadNumb": state.limits.thread_floor,
            "timeout": state.limits.timeout_secs,
            "timeoutForThread": state.limits.thread_timeout_secs,
        },
        "httpd": {
            "interface": config.network.interface,
            "port": config.network.port,
            "listen": config.network.listen,
            "ipv6": config.network.ipv6,
        },
    });

    reply.output = Output::buffer(doc.to_string());
    reply.mime = Some(MIME_JSON.to_string());
    Status::Ok
}

fn timeval(t: SystemTime) -> (u64, u32) {
    let d = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    (d.as_secs(), d.subsec_micros())
}

/// Serves a file from the static tree.
///
/// Tries the mapped cache first; when the cache refuses (file too big,
/// cache full with nothing reclaimable, stale entry) the file is streamed
/// through a scratch buffer instead. Traversal components and missing
/// paths are refused outright.
fn serve_www(cache: &Arc<MapCache>, root: &Path, segments: &[String], reply: &mut Reply) -> Status {
    let mut path = root.to_path_buf();

    for segment in segments {
        if segment == ".." {
            return Status::Forbidden;
        }
        path.push(segment);
        if !path.exists() {
            return Status::Forbidden;
        }
    }

    if path.is_dir() {
        path.push(INDEX_HTML);
    }

    let Ok(meta) = std::fs::metadata(&path) else {
        return Status::Forbidden;
    };
    let Ok(mtime) = meta.modified() else {
        return Status::Forbidden;
    };

    if let Some(map) = cache.find(&path, mtime) {
        reply.mime = Some(map.mime().to_string());
        reply.output = Output::Map { map };
        return Status::Ok;
    }

    let Ok(file) = std::fs::File::open(&path) else {
        return Status::Forbidden;
    };

    reply.mime = Some(
        mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or(MIME_TEXTHTML)
            .to_string(),
    );
    reply.output = Output::File {
        file: tokio::fs::File::from_std(file),
        len: meta.len(),
    };

    Status::Ok
}
