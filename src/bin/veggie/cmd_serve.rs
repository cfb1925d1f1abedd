use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tiny_http::{Header, Request, Response, Server};

use veggie::api::{self, ApiBody};
use veggie::{codec, Reply, RouteCache, ServiceDescriptor, Store, VeggieConfig};

/// Висящие (hang) запросы держим открытыми, но не бесконечно много.
const MAX_PARKED: usize = 1024;

pub fn exec(
    addr: Option<String>,
    profile_dir: Option<PathBuf>,
    services: Option<PathBuf>,
    index_profiles: bool,
) -> Result<()> {
    let mut cfg = VeggieConfig::from_env();
    if let Some(a) = addr {
        cfg = cfg.with_addr(a);
    }
    if let Some(d) = profile_dir {
        cfg = cfg.with_profile_dir(d);
    }
    if index_profiles {
        cfg = cfg.with_index_profiles(true);
    }
    info!("{}", cfg);

    let store = match services {
        Some(p) => {
            let bytes = fs::read(&p).with_context(|| format!("read {}", p.display()))?;
            let descs: Vec<ServiceDescriptor> = serde_json::from_slice(&bytes)
                .with_context(|| format!("parse service descriptors {}", p.display()))?;
            info!("seeding {} service(s) from {}", descs.len(), p.display());
            Store::with_services(descs)?
        }
        None => Store::new(),
    };
    let store = Arc::new(store);

    if cfg.index_profiles {
        codec::index_profile_dir(&store, &cfg)?;
    }

    let routes = RouteCache::new(store.clone());

    let server = Server::http(&cfg.addr).map_err(|e| anyhow!("bind http at {}: {}", cfg.addr, e))?;
    info!("veggie listening on {} (api at {})", cfg.addr, cfg.api_prefix);

    let mut parked: Vec<Request> = Vec::new();
    loop {
        let mut rq = match server.recv() {
            Ok(rq) => rq,
            Err(e) => {
                warn!("http recv error: {}", e);
                continue;
            }
        };

        let url = rq.url().to_string();
        let method = rq.method().as_str().to_string();

        let mut body = Vec::new();
        if let Err(e) = rq.as_reader().read_to_end(&mut body) {
            warn!("{} {}: cannot read body: {}", method, url, e);
            let _ = rq.respond(Response::from_string("bad request\n").with_status_code(400));
            continue;
        }

        if let Some(reply) = api::handle(&store, &cfg, &method, &url, &body) {
            let resp = match reply.body {
                ApiBody::Json(v) => json_response(reply.status, &v),
                ApiBody::Text(t) => Response::from_string(t).with_status_code(reply.status),
            };
            let _ = rq.respond(with_cors(resp));
            continue;
        }

        let host = rq
            .headers()
            .iter()
            .find(|h| h.field.equiv("Host"))
            .map(|h| h.value.as_str().to_string());

        let table = routes.table();
        match table.resolve_for_host(host.as_deref(), &url).map(|r| r.reply.clone()) {
            Some(Reply::Default { status, body }) | Some(Reply::Override { status, body }) => {
                let _ = rq.respond(with_cors(json_response(status, &body)));
            }
            Some(Reply::Hang) => {
                if parked.len() >= MAX_PARKED {
                    // старейший запрос отпускаем (tiny_http ответит сам при drop)
                    parked.remove(0);
                }
                parked.push(rq);
            }
            None => {
                let resp = Response::from_string("not found\n").with_status_code(404);
                let _ = rq.respond(resp);
            }
        }
    }
}

fn json_response(status: u16, v: &serde_json::Value) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut resp = Response::from_string(v.to_string()).with_status_code(status);
    if let Ok(ct) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        resp.add_header(ct);
    }
    resp
}

fn with_cors(mut resp: Response<std::io::Cursor<Vec<u8>>>) -> Response<std::io::Cursor<Vec<u8>>> {
    let headers: [(&[u8], &[u8]); 3] = [
        (b"Access-Control-Allow-Origin", b"*"),
        (b"Access-Control-Allow-Methods", b"*"),
        (b"Access-Control-Allow-Headers", b"Content-Type"),
    ];
    for (k, v) in headers {
        if let Ok(h) = Header::from_bytes(k, v) {
            resp.add_header(h);
        }
    }
    resp
}
