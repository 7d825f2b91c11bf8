/// Gateway configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret the CRUD backend presents on `/emit/*` requests.
    pub socket_secret: String,
    /// Browser origin allowed by CORS. `None` means any origin.
    pub allowed_origin: Option<String>,
    /// Port the HTTP/WebSocket server binds to.
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            socket_secret: required_var("SOCKET_SECRET"),
            allowed_origin: std::env::var("ALLOWED_ORIGIN")
                .ok()
                .filter(|s| !s.is_empty()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4003),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
