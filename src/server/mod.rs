use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::AppConfig;
use crate::data::item::TrinketCandidate;
use crate::data::metadata::{MetadataCache, MetadataSource, WowheadSource};
use crate::jobs::{JobQueue, SimcRunner, SimulationBackend};

pub mod api;
pub mod routes;

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Collaborators and per-job state shared by all requests.
pub struct AppState {
    pub config: AppConfig,
    pub jobs: Arc<dyn SimulationBackend>,
    pub metadata: Arc<dyn MetadataSource>,
    job_trinkets: Mutex<HashMap<String, Vec<TrinketCandidate>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        jobs: Arc<dyn SimulationBackend>,
        metadata: Arc<dyn MetadataSource>,
    ) -> Self {
        Self {
            config,
            jobs,
            metadata,
            job_trinkets: Mutex::new(HashMap::new()),
        }
    }

    /// Local simc queue and cached Wowhead lookups, as configured.
    pub fn from_config(config: &AppConfig) -> Self {
        let runner = Arc::new(SimcRunner::new(config.simc_bin.clone()));
        let jobs = Arc::new(
            JobQueue::start(runner, config.job_workers).with_result_ttl(config.job_result_ttl()),
        );
        let metadata = Arc::new(MetadataCache::new(
            WowheadSource::new(&config.metadata),
            config.metadata.ttl(),
        ));
        Self::new(config.clone(), jobs, metadata)
    }

    /// Candidates a pair job was built from, for ranking its results later.
    /// Entries for jobs the backend no longer knows are dropped here.
    pub fn remember_trinkets(&self, job_id: &str, candidates: Vec<TrinketCandidate>) {
        let mut remembered = self.job_trinkets.lock().unwrap_or_else(PoisonError::into_inner);
        remembered.retain(|id, _| self.jobs.status(id).is_ok());
        remembered.insert(job_id.to_string(), candidates);
    }

    pub fn remembered_jobs(&self) -> usize {
        self.job_trinkets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn trinkets_for(&self, job_id: &str) -> Vec<TrinketCandidate> {
        self.job_trinkets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
            .unwrap_or_default()
    }
}

pub fn run_server(config: &AppConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.bind_addr)?;
    let state = AppState::from_config(config);
    tracing::info!(bind_addr = %config.bind_addr, simc = %config.simc_bin.display(), "topgear server listening");

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&state, &mut stream) {
                    tracing::warn!(error = %err, "request error");
                }
            }
            Err(err) => tracing::warn!(error = %err, "connection failed"),
        }
    }

    Ok(())
}

struct RawRequest {
    method: String,
    path: String,
    body: String,
}

fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<RawRequest>> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line)? == 0 {
        return Ok(None);
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("GET").to_string();
    let path = parts.next().unwrap_or("/").to_string();

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0_u8; content_length.min(MAX_BODY_BYTES)];
    reader.read_exact(&mut body)?;
    Ok(Some(RawRequest {
        method,
        path,
        body: String::from_utf8_lossy(&body).into_owned(),
    }))
}

fn handle_connection(state: &AppState, stream: &mut TcpStream) -> std::io::Result<()> {
    let Some(request) = read_request(stream)? else {
        return Ok(());
    };
    tracing::debug!(method = %request.method, path = %request.path, bytes = request.body.len(), "request");

    let response = routes::route_request(state, &request.method, &request.path, &request.body);
    if response.status_code >= 500 {
        tracing::error!(path = %request.path, status = response.status_code, "request failed");
    }
    stream.write_all(response.to_http_string().as_bytes())?;
    stream.flush()?;
    Ok(())
}
