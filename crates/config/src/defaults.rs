pub fn default_service_name() -> String {
    "stockroom".to_string()
}

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_http_port() -> u16 {
    8080
}

pub fn default_storage_type() -> String {
    "memory".to_string()
}

pub fn default_run_migrations() -> bool {
    true
}

pub fn default_postgres_port() -> u16 {
    5432
}

pub fn default_ssl_mode() -> String {
    "prefer".to_string()
}

pub fn default_max_connections() -> u32 {
    10
}

pub fn default_connection_timeout() -> u64 {
    30
}

pub fn default_worker_pool_size() -> usize {
    4
}

pub fn default_queue_capacity() -> usize {
    256
}

pub fn default_request_timeout_seconds() -> u64 {
    30
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_metrics_port() -> u16 {
    9090
}
